use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Label shown for a sequenced id whose entity no longer exists.
pub const UNKNOWN_LABEL: &str = "Unknown";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EntityId);

/// Key partitioning distinct sequences, e.g. `venues`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Category {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

/// A selectable remote-stored item such as a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub display_name: String,
}

impl Entity {
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEntry {
    pub id: EntityId,
    pub position: u32,
    pub display_name: String,
}

/// Persisted form of one sequence slot; display text is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceItem {
    pub id: EntityId,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub category: Category,
    pub sequence: Vec<SequenceItem>,
}

impl SequenceRecord {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            sequence: Vec::new(),
        }
    }
}

/// `(label, value)` pair fed to a multi-select control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: EntityId,
}

impl From<&Entity> for SelectOption {
    fn from(entity: &Entity) -> Self {
        Self {
            label: entity.display_name.clone(),
            value: entity.id,
        }
    }
}

//! Row shapes as they travel over the wire (PostgREST JSON, the SQLite JSON
//! column) and their checked conversion into domain records.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Category, Entity, EntityId, SequenceItem, SequenceRecord},
    error::ValidationError,
    sequence::normalize_items,
};

/// Ids written by older clients may be JSON strings rather than numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl TryFrom<WireId> for EntityId {
    type Error = ValidationError;

    fn try_from(value: WireId) -> Result<Self, Self::Error> {
        match value {
            WireId::Number(id) => Ok(EntityId(id)),
            WireId::Text(raw) => raw
                .trim()
                .parse::<i64>()
                .map(EntityId)
                .map_err(|_| ValidationError::InvalidEntityId(raw)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<EntityRow> for Entity {
    fn from(row: EntityRow) -> Self {
        Self {
            id: EntityId(row.id),
            display_name: row.display_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceItemRow {
    pub id: WireId,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRow {
    pub category: String,
    #[serde(default)]
    pub sequence: Option<Vec<SequenceItemRow>>,
}

impl TryFrom<SequenceRow> for SequenceRecord {
    type Error = ValidationError;

    fn try_from(row: SequenceRow) -> Result<Self, Self::Error> {
        let category = Category::new(&row.category)?;
        let mut raw = Vec::new();
        for item in row.sequence.unwrap_or_default() {
            raw.push((EntityId::try_from(item.id)?, item.position));
        }
        Ok(Self {
            category,
            sequence: normalize_items(raw),
        })
    }
}

impl From<&SequenceRecord> for SequenceRow {
    fn from(record: &SequenceRecord) -> Self {
        Self {
            category: record.category.as_str().to_string(),
            sequence: Some(
                record
                    .sequence
                    .iter()
                    .map(|item| SequenceItemRow {
                        id: WireId::Number(item.id.0),
                        position: i64::from(item.position),
                    })
                    .collect(),
            ),
        }
    }
}

/// Body of a PostgREST upsert; the sequence column holds JSON.
#[derive(Debug, Clone, Serialize)]
pub struct SequenceUpsertPayload<'a> {
    pub category: &'a str,
    pub sequence: &'a [SequenceItem],
}

impl<'a> From<&'a SequenceRecord> for SequenceUpsertPayload<'a> {
    fn from(record: &'a SequenceRecord) -> Self {
        Self {
            category: record.category.as_str(),
            sequence: &record.sequence,
        }
    }
}

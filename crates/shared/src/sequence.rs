//! The ordered selection as an immutable value.
//!
//! Every operation returns a new [`Sequence`] whose positions are the
//! contiguous permutation `1..=len` in list order, and whose ids are unique.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::domain::{
    Category, Entity, EntityId, SequenceEntry, SequenceItem, SequenceRecord, UNKNOWN_LABEL,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sequence {
    entries: Vec<SequenceEntry>,
}

impl Sequence {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the selection in the order the ids were picked. Repeated ids keep
    /// their first pick; ids with no matching entity get [`UNKNOWN_LABEL`].
    pub fn from_selection(selected: &[EntityId], entities: &[Entity]) -> Self {
        let labels = label_index(entities);
        let mut seen = HashSet::with_capacity(selected.len());
        let ids = selected.iter().copied().filter(|id| seen.insert(*id));
        Self::numbered(ids.map(|id| (id, lookup_label(&labels, id))))
    }

    /// Joins a persisted record against the current entity list. Missing
    /// entities are kept under [`UNKNOWN_LABEL`] rather than dropped.
    pub fn resolve(record: &SequenceRecord, entities: &[Entity]) -> Self {
        let labels = label_index(entities);
        let mut ordered: Vec<SequenceItem> = record.sequence.clone();
        ordered.sort_by_key(|item| item.position);
        let mut seen = HashSet::with_capacity(ordered.len());
        Self::numbered(
            ordered
                .into_iter()
                .filter(|item| seen.insert(item.id))
                .map(|item| (item.id, lookup_label(&labels, item.id))),
        )
    }

    /// Moves `source` into the slot `target` occupies, shifting the entries in
    /// between by one. Unknown ids, `source == target` and sequences shorter
    /// than two entries leave the value unchanged.
    pub fn reorder(&self, source: EntityId, target: EntityId) -> Self {
        if source == target || self.entries.len() < 2 {
            return self.clone();
        }
        let (Some(from), Some(to)) = (self.index_of(source), self.index_of(target)) else {
            return self.clone();
        };

        let mut entries = self.entries.clone();
        let moved = entries.remove(from);
        entries.insert(to, moved);
        Self::numbered(entries.into_iter().map(|e| (e.id, e.display_name)))
    }

    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn position_of(&self, id: EntityId) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.position)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index_of(id).is_some()
    }

    /// Drops the cached display text, keeping only what gets persisted.
    pub fn to_record(&self, category: Category) -> SequenceRecord {
        SequenceRecord {
            category,
            sequence: self
                .entries
                .iter()
                .map(|entry| SequenceItem {
                    id: entry.id,
                    position: entry.position,
                })
                .collect(),
        }
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn numbered(items: impl IntoIterator<Item = (EntityId, String)>) -> Self {
        let entries = items
            .into_iter()
            .zip(1u32..)
            .map(|((id, display_name), position)| SequenceEntry {
                id,
                position,
                display_name,
            })
            .collect();
        Self { entries }
    }
}

/// Orders raw `(id, position)` pairs by position (ties keep their stored
/// order), drops repeated ids and renumbers to `1..=len`.
pub fn normalize_items(raw: Vec<(EntityId, i64)>) -> Vec<SequenceItem> {
    let mut indexed: Vec<(usize, EntityId, i64)> = raw
        .into_iter()
        .enumerate()
        .map(|(index, (id, position))| (index, id, position))
        .collect();
    indexed.sort_by_key(|(index, _, position)| (*position, *index));

    let mut seen = HashSet::with_capacity(indexed.len());
    let mut items = Vec::with_capacity(indexed.len());
    for (_, id, _) in indexed {
        if !seen.insert(id) {
            warn!(entity_id = id.0, "dropping repeated id in persisted sequence");
            continue;
        }
        items.push(SequenceItem {
            id,
            position: (items.len() + 1) as u32,
        });
    }
    items
}

fn label_index(entities: &[Entity]) -> HashMap<EntityId, &str> {
    entities
        .iter()
        .map(|entity| (entity.id, entity.display_name.as_str()))
        .collect()
}

fn lookup_label(labels: &HashMap<EntityId, &str>, id: EntityId) -> String {
    labels
        .get(&id)
        .copied()
        .unwrap_or(UNKNOWN_LABEL)
        .to_string()
}

#[cfg(test)]
#[path = "tests/sequence_tests.rs"]
mod tests;

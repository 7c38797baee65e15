//! Ordered sequence editor: selection, reordering and persistence of one
//! ordered subset of entities per category.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::{
    domain::{Category, Entity, EntityId, SelectOption, SequenceRecord},
    error::{ErrorCode, ErrorReport},
    sequence::Sequence,
};
use storage::SequenceStore;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("failed to load {what}: {source:#}")]
    Fetch {
        what: &'static str,
        source: anyhow::Error,
    },
    #[error("failed to save sequence for '{category}': {source:#}")]
    Persist {
        category: Category,
        source: anyhow::Error,
    },
    #[error("a save for '{category}' is already in flight")]
    SaveInFlight { category: Category },
    #[error("editor is closed")]
    Closed,
}

impl EditorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EditorError::Fetch { .. } => ErrorCode::Fetch,
            EditorError::Persist { .. } => ErrorCode::Persist,
            EditorError::SaveInFlight { .. } => ErrorCode::Busy,
            EditorError::Closed => ErrorCode::Internal,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.to_string())
    }
}

/// Transient notifications for whatever renders the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    EntitiesLoaded {
        count: usize,
    },
    SequenceLoaded {
        category: Category,
        sequence: Sequence,
        persisted: bool,
    },
    SelectionChanged(Sequence),
    Reordered {
        source: EntityId,
        target: EntityId,
        sequence: Sequence,
    },
    Saved {
        category: Category,
        entries: usize,
    },
    Failed(ErrorReport),
}

#[derive(Default)]
struct EditorState {
    entities: Vec<Entity>,
    sequence: Sequence,
}

pub struct SequenceEditor {
    store: Arc<dyn SequenceStore>,
    state: RwLock<EditorState>,
    saving: Arc<AtomicBool>,
    closed: AtomicBool,
    events: broadcast::Sender<EditorEvent>,
}

/// Clears the in-flight flag even when the save future is dropped midway.
struct SaveGuard(Arc<AtomicBool>);

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SequenceEditor {
    pub fn new(store: Arc<dyn SequenceStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            state: RwLock::new(EditorState::default()),
            saving: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events.subscribe()
    }

    /// Fetches every entity. On failure the selection is reset to empty and
    /// the previously loaded entities are kept.
    pub async fn load_entities(&self) -> Result<Vec<Entity>, EditorError> {
        self.ensure_open()?;
        let fetched = self.store.fetch_entities().await;
        self.ensure_open()?;

        match fetched {
            Ok(entities) => {
                self.state.write().await.entities = entities.clone();
                debug!(count = entities.len(), "entities loaded");
                self.publish(EditorEvent::EntitiesLoaded {
                    count: entities.len(),
                });
                Ok(entities)
            }
            Err(source) => {
                self.state.write().await.sequence = Sequence::empty();
                Err(self.fail(EditorError::Fetch {
                    what: "entities",
                    source,
                }))
            }
        }
    }

    /// Fetches the record for `category` and resolves it against the loaded
    /// entities. An absent record starts an empty selection.
    pub async fn load_persisted_sequence(
        &self,
        category: &Category,
    ) -> Result<Option<SequenceRecord>, EditorError> {
        self.ensure_open()?;
        let fetched = self.store.fetch_sequence(category).await;
        self.ensure_open()?;

        let record = fetched.map_err(|source| {
            self.fail(EditorError::Fetch {
                what: "sequence",
                source,
            })
        })?;

        let sequence = {
            let mut state = self.state.write().await;
            state.sequence = match &record {
                Some(record) => Sequence::resolve(record, &state.entities),
                None => Sequence::empty(),
            };
            state.sequence.clone()
        };
        info!(
            category = %category,
            entries = sequence.len(),
            persisted = record.is_some(),
            "sequence loaded"
        );
        self.publish(EditorEvent::SequenceLoaded {
            category: category.clone(),
            sequence,
            persisted: record.is_some(),
        });
        Ok(record)
    }

    /// Loads entities, then the category's persisted order.
    pub async fn load(&self, category: &Category) -> Result<Sequence, EditorError> {
        self.load_entities().await?;
        self.load_persisted_sequence(category).await?;
        Ok(self.sequence().await)
    }

    pub async fn options(&self) -> Vec<SelectOption> {
        self.state
            .read()
            .await
            .entities
            .iter()
            .map(SelectOption::from)
            .collect()
    }

    pub async fn sequence(&self) -> Sequence {
        self.state.read().await.sequence.clone()
    }

    pub async fn set_selection(&self, selected: &[EntityId]) -> Sequence {
        let sequence = {
            let mut state = self.state.write().await;
            state.sequence = Sequence::from_selection(selected, &state.entities);
            state.sequence.clone()
        };
        debug!(entries = sequence.len(), "selection replaced");
        self.publish(EditorEvent::SelectionChanged(sequence.clone()));
        sequence
    }

    pub async fn reorder(&self, source: EntityId, target: EntityId) -> Sequence {
        let (sequence, changed) = {
            let mut state = self.state.write().await;
            let next = state.sequence.reorder(source, target);
            let changed = next != state.sequence;
            state.sequence = next;
            (state.sequence.clone(), changed)
        };
        if changed {
            self.publish(EditorEvent::Reordered {
                source,
                target,
                sequence: sequence.clone(),
            });
        } else {
            debug!(source = source.0, target = target.0, "reorder ignored");
        }
        sequence
    }

    /// Replaces the stored record for `category` with the current order.
    /// Only one save may be in flight; the in-memory sequence is never
    /// touched by a save, successful or not.
    pub async fn save(&self, category: &Category) -> Result<(), EditorError> {
        self.begin_save(category).await?.finish().await
    }

    /// Claims the in-flight guard and snapshots the current order. Edits made
    /// after this returns are not part of the returned save.
    pub async fn begin_save(&self, category: &Category) -> Result<PendingSave, EditorError> {
        self.ensure_open()?;
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(self.fail(EditorError::SaveInFlight {
                category: category.clone(),
            }));
        }
        let guard = SaveGuard(self.saving.clone());

        let record = self.state.read().await.sequence.to_record(category.clone());
        Ok(PendingSave {
            store: self.store.clone(),
            record,
            events: self.events.clone(),
            _guard: guard,
        })
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Tears the editor down; fetches that resolve afterwards are discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), EditorError> {
        if self.is_closed() {
            debug!("discarding editor operation after close");
            return Err(EditorError::Closed);
        }
        Ok(())
    }

    fn fail(&self, err: EditorError) -> EditorError {
        report_failure(&self.events, err)
    }

    fn publish(&self, event: EditorEvent) {
        let _ = self.events.send(event);
    }
}

/// A save whose record is already fixed; the in-flight guard is held until
/// this is finished or dropped.
pub struct PendingSave {
    store: Arc<dyn SequenceStore>,
    record: SequenceRecord,
    events: broadcast::Sender<EditorEvent>,
    _guard: SaveGuard,
}

impl PendingSave {
    pub fn record(&self) -> &SequenceRecord {
        &self.record
    }

    pub async fn finish(self) -> Result<(), EditorError> {
        let category = self.record.category.clone();
        let entries = self.record.sequence.len();
        match self.store.upsert_sequence(&self.record).await {
            Ok(()) => {
                info!(category = %category, entries, "sequence saved");
                let _ = self.events.send(EditorEvent::Saved { category, entries });
                Ok(())
            }
            Err(source) => Err(report_failure(
                &self.events,
                EditorError::Persist { category, source },
            )),
        }
    }
}

fn report_failure(events: &broadcast::Sender<EditorEvent>, err: EditorError) -> EditorError {
    warn!(code = ?err.code(), error = %err, "editor operation failed");
    let _ = events.send(EditorEvent::Failed(err.report()));
    err
}

#[cfg(test)]
#[path = "tests/editor_tests.rs"]
mod tests;

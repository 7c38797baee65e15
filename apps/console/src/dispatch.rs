//! Applies intents to the editor and renders its notifications.

use std::sync::Arc;

use client_core::{EditorError, EditorEvent, SequenceEditor};
use shared::{domain::Category, sequence::Sequence};
use tokio::task::JoinSet;
use tracing::debug;

use crate::commands::{Intent, HELP};

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    editor: Arc<SequenceEditor>,
    category: Category,
    saves: JoinSet<()>,
}

impl Session {
    pub fn new(editor: Arc<SequenceEditor>, category: Category) -> Self {
        Self {
            editor,
            category,
            saves: JoinSet::new(),
        }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    /// Saves run in the background so the prompt stays usable; their outcome
    /// arrives as an editor notification. The order is captured before the
    /// prompt returns.
    pub async fn dispatch(&mut self, intent: Intent) -> Flow {
        match intent {
            Intent::Options => {
                for option in self.editor.options().await {
                    println!("{:>6}  {}", option.value.0, option.label);
                }
            }
            Intent::Show => println!("{}", render_sequence(&self.category, &self.editor.sequence().await)),
            Intent::Select(ids) => {
                self.editor.set_selection(&ids).await;
            }
            Intent::Move { source, target } => {
                self.editor.reorder(source, target).await;
            }
            Intent::Save => match self.editor.begin_save(&self.category).await {
                Ok(pending) => {
                    debug!(entries = pending.record().sequence.len(), "save started");
                    self.saves.spawn(async move {
                        if let Err(err) = pending.finish().await {
                            debug!(error = %err, "background save finished with error");
                        }
                    });
                }
                Err(EditorError::SaveInFlight { .. }) => {
                    println!("a save is already in progress");
                }
                Err(err) => debug!(error = %err, "save not started"),
            },
            Intent::Reload => {
                let _ = self.editor.load(&self.category).await;
            }
            Intent::SwitchCategory(category) => {
                self.category = category;
                let _ = self.editor.load(&self.category).await;
            }
            Intent::Help => println!("{HELP}"),
            Intent::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Waits for every background save to finish.
    pub async fn settle(&mut self) {
        while self.saves.join_next().await.is_some() {}
    }
}

pub fn render_sequence(category: &Category, sequence: &Sequence) -> String {
    if sequence.is_empty() {
        return format!("'{category}' has no sequenced entities");
    }
    let mut out = format!("'{category}':");
    for entry in sequence.entries() {
        out.push_str(&format!(
            "\n{:>4}. {} (id={})",
            entry.position, entry.display_name, entry.id
        ));
    }
    out
}

pub fn describe_event(event: &EditorEvent) -> String {
    match event {
        EditorEvent::EntitiesLoaded { count } => format!("loaded {count} entities"),
        EditorEvent::SequenceLoaded {
            category,
            sequence,
            persisted,
        } => {
            if *persisted {
                format!("loaded '{category}' with {} entries", sequence.len())
            } else {
                format!("'{category}' has no saved order yet")
            }
        }
        EditorEvent::SelectionChanged(sequence) => {
            format!("selection now has {} entries", sequence.len())
        }
        EditorEvent::Reordered {
            source,
            target,
            sequence,
        } => {
            let position = sequence.position_of(*source).unwrap_or_default();
            format!("moved {source} into {target}'s slot (now #{position})")
        }
        EditorEvent::Saved { category, entries } => {
            format!("saved '{category}' ({entries} entries)")
        }
        EditorEvent::Failed(report) => format!("error: {}", report.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{Entity, EntityId};
    use storage::MemoryStore;

    fn venues() -> Category {
        Category::new("venues").expect("category")
    }

    async fn session(store: Arc<MemoryStore>) -> Session {
        let editor = Arc::new(SequenceEditor::new(store));
        editor.load(&venues()).await.expect("load");
        Session::new(editor, venues())
    }

    fn bars() -> Vec<Entity> {
        vec![
            Entity::new(1, "Bar A"),
            Entity::new(2, "Bar B"),
            Entity::new(3, "Bar C"),
        ]
    }

    #[tokio::test]
    async fn select_move_save_reaches_store() {
        let store = Arc::new(MemoryStore::with_entities(bars()));
        let mut session = session(store.clone()).await;

        session
            .dispatch(Intent::Select(vec![EntityId(2), EntityId(1), EntityId(3)]))
            .await;
        session
            .dispatch(Intent::Move {
                source: EntityId(1),
                target: EntityId(3),
            })
            .await;
        assert_eq!(session.dispatch(Intent::Save).await, Flow::Continue);
        session.settle().await;

        let ids: Vec<i64> = store
            .record(&venues())
            .expect("record")
            .sequence
            .iter()
            .map(|item| item.id.0)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    fn stored_ids(store: &MemoryStore) -> Option<Vec<i64>> {
        store
            .record(&venues())
            .map(|record| record.sequence.iter().map(|item| item.id.0).collect())
    }

    #[tokio::test]
    async fn save_keeps_the_order_at_the_prompt() {
        let store = Arc::new(MemoryStore::with_entities(bars()));
        let mut session = session(store.clone()).await;

        session
            .dispatch(Intent::Select(vec![EntityId(2), EntityId(1), EntityId(3)]))
            .await;
        session.dispatch(Intent::Save).await;
        session.dispatch(Intent::Select(vec![EntityId(1)])).await;
        session.settle().await;

        assert_eq!(stored_ids(&store), Some(vec![2, 1, 3]));
        assert_eq!(session.editor.sequence().await.len(), 1);
    }

    #[tokio::test]
    async fn settle_waits_for_the_save_in_flight() {
        let store = Arc::new(MemoryStore::with_entities(bars()));
        let mut session = session(store.clone()).await;
        session.dispatch(Intent::Select(vec![EntityId(3)])).await;
        let gate = store.hold_upserts();

        session.dispatch(Intent::Save).await;
        session.dispatch(Intent::Save).await;
        assert!(session.editor.is_saving());

        let release = tokio::spawn(async move {
            while store.upsert_calls() == 0 {
                tokio::task::yield_now().await;
            }
            gate.notify_one();
            store
        });
        session.settle().await;
        let store = release.await.expect("join");

        assert!(!session.editor.is_saving());
        assert_eq!(store.upsert_calls(), 1);
        assert_eq!(stored_ids(&store), Some(vec![3]));
    }

    #[tokio::test]
    async fn quit_stops_the_loop() {
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store).await;
        assert_eq!(session.dispatch(Intent::Quit).await, Flow::Quit);
    }

    #[tokio::test]
    async fn switching_category_loads_its_order() {
        let store = Arc::new(MemoryStore::with_entities(bars()));
        let bars_category = Category::new("bars").expect("category");
        store.insert_record(
            Sequence::from_selection(&[EntityId(3)], &bars()).to_record(bars_category.clone()),
        );
        let mut session = session(store).await;

        session
            .dispatch(Intent::SwitchCategory(bars_category.clone()))
            .await;
        assert_eq!(session.category(), &bars_category);
        assert_eq!(
            render_sequence(session.category(), &session.editor.sequence().await),
            "'bars':\n   1. Bar C (id=3)"
        );
    }

    #[test]
    fn describes_failures_with_message() {
        let event = EditorEvent::Failed(shared::error::ErrorReport::new(
            shared::error::ErrorCode::Persist,
            "boom",
        ));
        assert_eq!(describe_event(&event), "error: boom");
    }
}

//! In-process [`SequenceStore`] for tests and offline demos.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Category, Entity, EntityId, SequenceRecord};
use tokio::sync::Notify;

use crate::SequenceStore;

#[derive(Default)]
struct MemoryState {
    entities: Vec<Entity>,
    records: HashMap<Category, SequenceRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_fetch: AtomicBool,
    fail_upsert: AtomicBool,
    upsert_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    upsert_gate: Mutex<Option<Arc<Notify>>>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let store = Self::default();
        store.lock().entities = entities;
        store
    }

    pub fn set_entities(&self, entities: Vec<Entity>) {
        self.lock().entities = entities;
    }

    pub fn remove_entity(&self, id: EntityId) {
        self.lock().entities.retain(|entity| entity.id != id);
    }

    pub fn insert_record(&self, record: SequenceRecord) {
        self.lock().records.insert(record.category.clone(), record);
    }

    pub fn record(&self, category: &Category) -> Option<SequenceRecord> {
        self.lock().records.get(category).cloned()
    }

    /// Makes every read fail until cleared.
    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    /// Number of upserts that reached the store, including failed ones.
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of entity and sequence reads that reached the store.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Parks every following upsert until the returned handle is notified.
    pub fn hold_upserts(&self) -> Arc<Notify> {
        install_gate(&self.upsert_gate)
    }

    /// Parks every following read until the returned handle is notified.
    pub fn hold_fetches(&self) -> Arc<Notify> {
        install_gate(&self.fetch_gate)
    }

    async fn enter_fetch(&self) -> Result<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.fetch_gate).await;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(anyhow!("memory store: fetch failure injected"));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn fetch_entities(&self) -> Result<Vec<Entity>> {
        self.enter_fetch().await?;
        Ok(self.lock().entities.clone())
    }

    async fn fetch_sequence(&self, category: &Category) -> Result<Option<SequenceRecord>> {
        self.enter_fetch().await?;
        Ok(self.lock().records.get(category).cloned())
    }

    async fn upsert_sequence(&self, record: &SequenceRecord) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        pass_gate(&self.upsert_gate).await;
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(anyhow!(
                "memory store: upsert failure injected for '{}'",
                record.category
            ));
        }
        self.lock()
            .records
            .insert(record.category.clone(), record.clone());
        Ok(())
    }
}

fn install_gate(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(gate.clone());
    gate
}

async fn pass_gate(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

use shared::{
    domain::{Category, Entity, EntityId, SequenceRecord},
    protocol::{SequenceItemRow, SequenceRow},
};

mod memory;

pub use memory::MemoryStore;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/sequencer.db";

/// Data-access capability the sequence editor is built on.
///
/// `fetch_sequence` returning `Ok(None)` means the category has never been
/// saved; that is not an error.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn fetch_entities(&self) -> Result<Vec<Entity>>;
    async fn fetch_sequence(&self, category: &Category) -> Result<Option<SequenceRecord>>;
    /// Inserts the record or replaces whatever is stored for its category.
    async fn upsert_sequence(&self, record: &SequenceRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to an in-memory database would see its own empty schema
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(database_url, "sqlite sequence store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_entity(&self, display_name: &str) -> Result<EntityId> {
        let rec = sqlx::query("INSERT INTO entities (display_name) VALUES (?) RETURNING id")
            .bind(display_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(EntityId(rec.get::<i64, _>(0)))
    }

    pub async fn rename_entity(&self, id: EntityId, display_name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE entities SET display_name = ? WHERE id = ?")
            .bind(display_name)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes the entity only; sequences that reference it keep the id.
    pub async fn delete_entity(&self, id: EntityId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Categories with a stored record, empty ones included.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT category FROM sequence_records ORDER BY category ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Category::new(r.get::<String, _>(0)).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl SequenceStore for Storage {
    async fn fetch_entities(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query("SELECT id, display_name FROM entities ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("failed to list entities")?;
        Ok(rows
            .into_iter()
            .map(|r| Entity {
                id: EntityId(r.get::<i64, _>(0)),
                display_name: r.get::<String, _>(1),
            })
            .collect())
    }

    async fn fetch_sequence(&self, category: &Category) -> Result<Option<SequenceRecord>> {
        let row = sqlx::query("SELECT category, sequence FROM sequence_records WHERE category = ?")
            .bind(category.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load sequence for '{category}'"))?;
        let Some(row) = row else {
            debug!(category = %category, "no stored sequence");
            return Ok(None);
        };

        let raw_sequence = row.get::<String, _>(1);
        let items: Vec<SequenceItemRow> = serde_json::from_str(&raw_sequence)
            .with_context(|| format!("stored sequence for '{category}' is not valid JSON"))?;
        let record = SequenceRecord::try_from(SequenceRow {
            category: row.get::<String, _>(0),
            sequence: Some(items),
        })?;
        Ok(Some(record))
    }

    async fn upsert_sequence(&self, record: &SequenceRecord) -> Result<()> {
        let sequence = serde_json::to_string(&record.sequence)?;
        sqlx::query(
            r#"
            INSERT INTO sequence_records (category, sequence, updated_at)
            VALUES (?1, ?2, CURRENT_TIMESTAMP)
            ON CONFLICT(category) DO UPDATE SET
                sequence = excluded.sequence,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(record.category.as_str())
        .bind(sequence)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to upsert sequence for '{}'", record.category))?;
        Ok(())
    }
}

/// Accepts bare paths and `sqlite:` variants and returns a URL sqlx can open.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return DEFAULT_DATABASE_URL.to_string();
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

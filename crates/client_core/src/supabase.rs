//! [`SequenceStore`] over Supabase's PostgREST API.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Category, Entity, SequenceRecord},
    protocol::{EntityRow, SequenceRow, SequenceUpsertPayload},
};
use storage::SequenceStore;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("supabase api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid supabase url '{0}'")]
    InvalidUrl(String),
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    /// User session token; the anon key is sent as bearer when absent.
    pub access_token: Option<String>,
    pub entity_table: String,
    pub entity_label_column: String,
    pub sequence_table: String,
}

impl SupabaseConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            access_token: None,
            entity_table: "venues".into(),
            entity_label_column: "venue_name".into(),
            sequence_table: "sequences".into(),
        }
    }
}

pub struct SupabaseStore {
    http: Client,
    rest_base: Url,
    config: SupabaseConfig,
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> Result<Self, SupabaseError> {
        let base = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|_| SupabaseError::InvalidUrl(config.url.clone()))?;
        let rest_base = base
            .join("/rest/v1/")
            .map_err(|_| SupabaseError::InvalidUrl(config.url.clone()))?;
        Ok(Self {
            http: Client::new(),
            rest_base,
            config,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, SupabaseError> {
        self.rest_base
            .join(table)
            .map_err(|_| SupabaseError::InvalidUrl(format!("{}{table}", self.rest_base)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.anon_key);
        request
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }

    pub async fn list_entities(&self) -> Result<Vec<Entity>, SupabaseError> {
        let mut url = self.table_url(&self.config.entity_table)?;
        url.query_pairs_mut()
            .append_pair(
                "select",
                &format!("id,display_name:{}", self.config.entity_label_column),
            )
            .append_pair("order", "id.asc");

        let rows: Vec<EntityRow> = self
            .fetch_json(self.authorized(self.http.get(url)))
            .await?;
        debug!(table = %self.config.entity_table, rows = rows.len(), "fetched entities");
        Ok(rows.into_iter().map(Entity::from).collect())
    }

    pub async fn get_sequence(
        &self,
        category: &Category,
    ) -> Result<Option<SequenceRecord>, SupabaseError> {
        let mut url = self.table_url(&self.config.sequence_table)?;
        url.query_pairs_mut()
            .append_pair("select", "category,sequence")
            .append_pair("category", &format!("eq.{}", category.as_str()))
            .append_pair("limit", "1");

        let rows: Vec<SequenceRow> = self
            .fetch_json(self.authorized(self.http.get(url)))
            .await?;
        if rows.len() > 1 {
            warn!(category = %category, rows = rows.len(), "more than one sequence row");
        }
        rows.into_iter()
            .next()
            .map(|row| {
                SequenceRecord::try_from(row).map_err(|e| SupabaseError::Parse(e.to_string()))
            })
            .transpose()
    }

    pub async fn put_sequence(&self, record: &SequenceRecord) -> Result<(), SupabaseError> {
        let mut url = self.table_url(&self.config.sequence_table)?;
        url.query_pairs_mut().append_pair("on_conflict", "category");

        let res = self
            .authorized(self.http.post(url))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&SequenceUpsertPayload::from(record))
            .send()
            .await?;
        check_status(res).await?;
        debug!(category = %record.category, entries = record.sequence.len(), "upserted sequence");
        Ok(())
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SupabaseError> {
        let res = check_status(request.send().await?).await?;
        let body = res.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| SupabaseError::Parse(format!("failed to parse response: {e}")))
    }
}

async fn check_status(res: Response) -> Result<Response, SupabaseError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let message = res.text().await.unwrap_or_default();
    Err(SupabaseError::Api { status, message })
}

#[async_trait]
impl SequenceStore for SupabaseStore {
    async fn fetch_entities(&self) -> Result<Vec<Entity>> {
        Ok(self.list_entities().await?)
    }

    async fn fetch_sequence(&self, category: &Category) -> Result<Option<SequenceRecord>> {
        Ok(self.get_sequence(category).await?)
    }

    async fn upsert_sequence(&self, record: &SequenceRecord) -> Result<()> {
        Ok(self.put_sequence(record).await?)
    }
}

#[cfg(test)]
#[path = "tests/supabase_tests.rs"]
mod tests;

use std::{collections::HashMap, fs, path::Path, str::FromStr, sync::Arc};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use shared::domain::Category;
use storage::{normalize_database_url, SequenceStore, Storage, DEFAULT_DATABASE_URL};
use tracing::{info, warn};

use crate::supabase::{SupabaseConfig, SupabaseStore};

pub const DEFAULT_SETTINGS_FILE: &str = "sequencer.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Sqlite,
    Supabase,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "supabase" => Ok(Self::Supabase),
            other => Err(anyhow!("unknown backend '{other}' (expected sqlite or supabase)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backend: Backend,
    pub database_url: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_access_token: Option<String>,
    pub entity_table: String,
    pub entity_label_column: String,
    pub sequence_table: String,
    pub default_category: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            database_url: DEFAULT_DATABASE_URL.into(),
            supabase_url: None,
            supabase_anon_key: None,
            supabase_access_token: None,
            entity_table: "venues".into(),
            entity_label_column: "venue_name".into(),
            sequence_table: "sequences".into(),
            default_category: "venues".into(),
        }
    }
}

impl Settings {
    pub fn default_category(&self) -> Result<Category> {
        Category::new(&self.default_category).context("default_category is blank")
    }

    pub fn supabase_config(&self) -> Result<SupabaseConfig> {
        let url = self
            .supabase_url
            .clone()
            .ok_or_else(|| anyhow!("supabase backend needs SUPABASE_URL"))?;
        let anon_key = self
            .supabase_anon_key
            .clone()
            .ok_or_else(|| anyhow!("supabase backend needs SUPABASE_ANON_KEY"))?;
        Ok(SupabaseConfig {
            access_token: self.supabase_access_token.clone(),
            entity_table: self.entity_table.clone(),
            entity_label_column: self.entity_label_column.clone(),
            sequence_table: self.sequence_table.clone(),
            ..SupabaseConfig::new(url, anon_key)
        })
    }
}

/// Reads `sequencer.toml` from the working directory, then the process
/// environment.
pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// File values override defaults and environment values override the file.
/// An unreadable or malformed file is logged and skipped.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => apply(&mut settings, |key| file_cfg.get(key).cloned()),
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring malformed settings file"),
        }
    }

    let from_env = |key: &str| {
        env(&format!("APP__{}", key.to_ascii_uppercase())).or_else(|| match key {
            "backend" => env("SEQUENCER_BACKEND"),
            "database_url" => env("DATABASE_URL"),
            "supabase_url" => env("SUPABASE_URL"),
            "supabase_anon_key" => env("SUPABASE_ANON_KEY"),
            "supabase_access_token" => env("SUPABASE_ACCESS_TOKEN"),
            _ => None,
        })
    };
    apply(&mut settings, from_env);

    settings.database_url = normalize_database_url(&settings.database_url);
    settings
}

fn apply(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("backend") {
        match v.parse() {
            Ok(backend) => settings.backend = backend,
            Err(err) => warn!(error = %err, "keeping backend {:?}", settings.backend),
        }
    }
    if let Some(v) = lookup("database_url") {
        settings.database_url = v;
    }
    if let Some(v) = lookup("supabase_url") {
        settings.supabase_url = Some(v);
    }
    if let Some(v) = lookup("supabase_anon_key") {
        settings.supabase_anon_key = Some(v);
    }
    if let Some(v) = lookup("supabase_access_token") {
        settings.supabase_access_token = Some(v);
    }
    if let Some(v) = lookup("entity_table") {
        settings.entity_table = v;
    }
    if let Some(v) = lookup("entity_label_column") {
        settings.entity_label_column = v;
    }
    if let Some(v) = lookup("sequence_table") {
        settings.sequence_table = v;
    }
    if let Some(v) = lookup("default_category") {
        settings.default_category = v;
    }
}

pub async fn open_store(settings: &Settings) -> Result<Arc<dyn SequenceStore>> {
    match settings.backend {
        Backend::Sqlite => {
            let storage = Storage::new(&settings.database_url)
                .await
                .with_context(|| format!("failed to open {}", settings.database_url))?;
            Ok(Arc::new(storage))
        }
        Backend::Supabase => {
            let config = settings.supabase_config()?;
            info!(url = %config.url, sequence_table = %config.sequence_table, "using supabase backend");
            Ok(Arc::new(SupabaseStore::new(config)?))
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

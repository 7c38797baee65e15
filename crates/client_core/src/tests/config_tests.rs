use std::{collections::HashMap, fs};

use super::*;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("missing.toml"), env_of(&[]));
    assert_eq!(settings.backend, Backend::Sqlite);
    assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(settings.default_category().expect("category").as_str(), "venues");
}

#[test]
fn env_overrides_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sequencer.toml");
    fs::write(
        &path,
        "backend = \"supabase\"\nsupabase_url = \"https://file.supabase.co\"\nsequence_table = \"venue_sequence\"\n",
    )
    .expect("write");

    let settings = load_settings_from(
        &path,
        env_of(&[
            ("SUPABASE_URL", "https://env.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("APP__DEFAULT_CATEGORY", "bars"),
        ]),
    );
    assert_eq!(settings.backend, Backend::Supabase);
    assert_eq!(settings.supabase_url.as_deref(), Some("https://env.supabase.co"));
    assert_eq!(settings.sequence_table, "venue_sequence");
    assert_eq!(settings.default_category, "bars");

    let config = settings.supabase_config().expect("supabase config");
    assert_eq!(config.anon_key, "anon");
    assert_eq!(config.sequence_table, "venue_sequence");
    assert!(config.access_token.is_none());
}

#[test]
fn prefixed_env_wins_over_plain_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(
        &dir.path().join("missing.toml"),
        env_of(&[
            ("DATABASE_URL", "./plain.db"),
            ("APP__DATABASE_URL", "./prefixed.db"),
        ]),
    );
    assert_eq!(settings.database_url, "sqlite://./prefixed.db");
}

#[test]
fn malformed_file_and_unknown_backend_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sequencer.toml");
    fs::write(&path, "this is = = not toml").expect("write");

    let settings = load_settings_from(&path, env_of(&[("SEQUENCER_BACKEND", "mongo")]));
    assert_eq!(settings.backend, Backend::Sqlite);
}

#[test]
fn supabase_config_requires_url_and_key() {
    let settings = Settings {
        backend: Backend::Supabase,
        ..Settings::default()
    };
    let err = settings.supabase_config().expect_err("should fail");
    assert!(err.to_string().contains("SUPABASE_URL"));
}

#[tokio::test]
async fn opens_sqlite_store_from_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        database_url: normalize_database_url(&dir.path().join("db").join("seq.db").to_string_lossy()),
        ..Settings::default()
    };
    let store = open_store(&settings).await.expect("store");
    assert!(store.fetch_entities().await.expect("entities").is_empty());
}

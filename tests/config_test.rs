//! Tests for config loading, env overrides and saving

use serial_test::serial;
use serverwatch::config::{Config, ENV_DISCORD_TOKEN, ENV_IPINFO_TOKEN, ENV_LOG_FORMAT};
use serverwatch::i18n::Locale;
use serverwatch::models::Endpoint;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE: &str = r#"
[discord]
token = "file-token"
channel_id = 42

[monitor]
interval_secs = 30
language = "en"

[[servers]]
name = "Alpha"
ip = "10.0.0.5"
port = 27015
connect_link = "steam://connect/10.0.0.5:27015"
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("serverwatch.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn clear_env() {
    for key in [ENV_DISCORD_TOKEN, ENV_IPINFO_TOKEN, ENV_LOG_FORMAT] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_file_with_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let config = Config::load(&write_config(&dir, SAMPLE)).unwrap();

    config.validate().unwrap();
    assert_eq!(config.discord.token, "file-token");
    assert_eq!(config.discord.channel_id, 42);
    assert_eq!(config.interval(), Duration::from_secs(30));
    assert_eq!(config.probe_timeout(), Duration::from_secs(3));
    assert_eq!(config.default_retry_after(), Duration::from_secs(1));
    assert_eq!(config.monitor.language, Locale::En);
    assert_eq!(config.servers.len(), 1);
    assert!(config.geo.token.is_none());
}

#[test]
fn test_example_config_is_valid() {
    let config = Config::from_file(Path::new("serverwatch.example.toml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.monitor.language, Locale::Ru);
    assert!(config.find_endpoint("203.0.113.10", 27015).is_some());
}

#[test]
#[serial]
fn test_env_overrides_secrets() {
    clear_env();
    std::env::set_var(ENV_DISCORD_TOKEN, "env-token");
    std::env::set_var(ENV_IPINFO_TOKEN, "ipinfo");
    std::env::set_var(ENV_LOG_FORMAT, "json");

    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, SAMPLE);

    let raw = Config::from_file(&path).unwrap();
    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(raw.discord.token, "file-token");
    assert_eq!(config.discord.token, "env-token");
    assert_eq!(config.geo.token.as_deref(), Some("ipinfo"));
    assert_eq!(config.logging.format, "json");
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    clear_env();
    std::env::set_var(ENV_DISCORD_TOKEN, "  ");

    let config = Config::default().with_env_overrides();
    clear_env();

    assert!(config.discord.token.is_empty());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[monitor\ninterval_secs = ");

    let err = Config::from_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse TOML"));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(Config::from_file(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_validation_rejects_duplicates_and_bad_values() {
    let dir = TempDir::new().unwrap();
    let duplicated = format!(
        "{SAMPLE}\n[[servers]]\nname = \"Alpha\"\nip = \"10.0.0.6\"\n\
         port = 27016\nconnect_link = \"x\"\n"
    );
    let config = Config::from_file(&write_config(&dir, &duplicated)).unwrap();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.monitor.interval_secs = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.logging.format = "yaml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_add_server_and_save() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, SAMPLE);
    let config = Config::from_file(&path).unwrap();

    let bravo = Endpoint::new("Bravo", "10.0.0.6", 27016, "steam://connect/10.0.0.6:27016");
    let updated = config.with_endpoint(bravo.clone()).unwrap();
    assert_eq!(config.servers.len(), 1);

    updated.save(&path).unwrap();

    let reloaded = Config::from_file(&path).unwrap();
    reloaded.validate().unwrap();
    assert_eq!(reloaded.servers.len(), 2);
    assert_eq!(reloaded.find_endpoint("10.0.0.6", 27016), Some(&bravo));
    assert_eq!(reloaded.discord.token, "file-token");
    assert!(!dir.path().join("serverwatch.toml.tmp").exists());

    assert!(reloaded.with_endpoint(bravo).is_err());
}

#[test]
fn test_saved_config_omits_empty_secrets() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("serverwatch.toml");

    Config::default().save(&path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.contains("token"));
    assert!(content.contains("[monitor]"));
}

#[test]
fn test_bad_server_names_are_rejected() {
    let config = Config::default();
    assert!(config
        .with_endpoint(Endpoint::new("", "10.0.0.5", 27015, "x"))
        .is_err());
    assert!(config
        .with_endpoint(Endpoint::new("Alpha\nBravo", "10.0.0.5", 27015, "x"))
        .is_err());
    assert!(config
        .with_endpoint(Endpoint::new("Alpha", "10.0.0.5", 0, "x"))
        .is_err());
}

#[test]
fn test_language_codes_are_normalized() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[monitor]\nlanguage = \"ru-RU\"\n");
    assert_eq!(Config::from_file(&path).unwrap().monitor.language, Locale::Ru);

    let path = write_config(&dir, "[monitor]\nlanguage = \"en_GB\"\n");
    assert_eq!(Config::from_file(&path).unwrap().monitor.language, Locale::En);
}

use cloudinbox::config::{Config, load_config, save_config};
use cloudinbox::engine::EngineSettings;
use cloudinbox::window::TemplateMode;
use std::time::Duration;

fn write(dir: &tempfile::TempDir, json: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_valid_default_passes() {
    assert!(Config::default().validate().is_ok());
}

#[test]
fn test_file_values_reach_engine_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"{
            "api": {"baseUrl": "https://inbox.example.com", "pageLimit": 20},
            "sync": {"pollIntervalMs": 1500},
            "window": {"templateMode": "auto"},
            "viewer": {"userId": "agent-7"}
        }"#,
    );
    let config = load_config(Some(&path)).unwrap();
    let settings = EngineSettings::from_config(&config);
    assert_eq!(settings.page_limit, 20);
    assert_eq!(settings.poll_interval, Duration::from_millis(1500));
    assert_eq!(settings.template_mode, TemplateMode::Auto);
    assert_eq!(settings.viewer.as_deref(), Some("agent-7"));
}

#[test]
fn test_too_fast_polling_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, r#"{"sync": {"pollIntervalMs": 10}}"#);
    let err = load_config(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("pollIntervalMs"));
}

#[test]
fn test_enabled_gateway_without_secret_rejected() {
    let mut config = Config::default();
    config.gateway.enabled = true;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("gateway.secret"));
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let mut config = Config::default();
    config.notifications.muted_accounts = vec!["acct-9".to_string()];
    save_config(&config, Some(&path)).unwrap();

    let loaded = load_config(Some(&path)).unwrap();
    assert_eq!(loaded.notifications.muted_accounts, vec!["acct-9"]);
}

use super::*;

#[test]
fn test_default_config_validates() {
    let config = Config::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_json_uses_defaults() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.api.page_limit, 50);
    assert_eq!(config.sync.poll_interval_ms, 3000);
    assert_eq!(config.sync.optimistic_match_window_secs, 30);
    assert_eq!(config.sync.optimistic_stale_after_secs, 45);
    assert_eq!(config.sync.duplicate_window_secs, 3);
    assert_eq!(config.window.template_mode, TemplateMode::Manual);
    assert!(config.notifications.enabled);
    assert!(!config.gateway.enabled);
    assert_eq!(config.gateway.port, 18791);
}

#[test]
fn test_camel_case_keys() {
    let config: Config = serde_json::from_value(serde_json::json!({
        "api": {"baseUrl": "https://inbox.example.com/api", "accessToken": "tok", "pageLimit": 20},
        "sync": {"pollIntervalMs": 1000, "duplicateWindowSecs": 2},
        "window": {"templateMode": "auto"},
        "viewer": {"userId": "agent-1"},
        "notifications": {"mutedAccounts": ["acct-2"]}
    }))
    .unwrap();
    assert_eq!(config.api.base_url, "https://inbox.example.com/api");
    assert_eq!(config.api.page_limit, 20);
    assert_eq!(config.sync.poll_interval_ms, 1000);
    assert_eq!(config.sync.duplicate_window_secs, 2);
    assert_eq!(config.window.template_mode, TemplateMode::Auto);
    assert_eq!(config.viewer.user_id.as_deref(), Some("agent-1"));
    assert_eq!(config.notifications.muted_accounts, vec!["acct-2"]);
    assert!(config.validate().is_ok());
}

#[test]
fn test_serializes_camel_case() {
    let value = serde_json::to_value(Config::default()).unwrap();
    assert!(value["api"].get("pageLimit").is_some());
    assert!(value["sync"].get("optimisticStaleAfterSecs").is_some());
    assert!(value["window"].get("templateMode").is_some());
}

fn config_error(config: &Config) -> String {
    match config.validate() {
        Err(InboxError::Config(msg)) => msg,
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_invalid_base_url() {
    let mut config = Config::default();
    config.api.base_url = "not a url".into();
    assert!(config_error(&config).contains("api.baseUrl"));
}

#[test]
fn test_base_url_requires_http() {
    let mut config = Config::default();
    config.api.base_url = "ftp://inbox.example.com".into();
    assert!(config_error(&config).contains("http or https"));
}

#[test]
fn test_page_limit_bounds() {
    let mut config = Config::default();
    config.api.page_limit = 0;
    assert!(config_error(&config).contains("api.pageLimit"));
    config.api.page_limit = MAX_PAGE_LIMIT + 1;
    assert!(config_error(&config).contains("api.pageLimit"));
    config.api.page_limit = MAX_PAGE_LIMIT;
    assert!(config.validate().is_ok());
}

#[test]
fn test_poll_interval_floor() {
    let mut config = Config::default();
    config.sync.poll_interval_ms = MIN_POLL_INTERVAL_MS - 1;
    assert!(config_error(&config).contains("sync.pollIntervalMs"));
}

#[test]
fn test_duplicate_window_below_match_window() {
    let mut config = Config::default();
    config.sync.duplicate_window_secs = 30;
    assert!(config_error(&config).contains("sync.duplicateWindowSecs"));
}

#[test]
fn test_zero_match_window() {
    let mut config = Config::default();
    config.sync.optimistic_match_window_secs = 0;
    assert!(config_error(&config).contains("sync.optimisticMatchWindowSecs"));
}

#[test]
fn test_enabled_gateway_needs_secret() {
    let mut config = Config::default();
    config.gateway.enabled = true;
    assert!(config_error(&config).contains("gateway.secret"));
    config.gateway.secret = "s3cret".into();
    assert!(config.validate().is_ok());
}

#[test]
fn test_disabled_gateway_is_not_checked() {
    let mut config = Config::default();
    config.gateway.port = 0;
    assert!(config.validate().is_ok());
}

#[test]
fn test_debug_redacts_secrets() {
    let mut config = Config::default();
    config.api.access_token = "very-secret-token".into();
    config.gateway.secret = "hmac-secret".into();
    let printed = format!("{config:?}");
    assert!(!printed.contains("very-secret-token"));
    assert!(!printed.contains("hmac-secret"));
    assert!(printed.contains("[REDACTED]"));
}

#[test]
fn test_debug_marks_empty_secret() {
    let printed = format!("{:?}", ApiConfig::default());
    assert!(printed.contains("[empty]"));
}

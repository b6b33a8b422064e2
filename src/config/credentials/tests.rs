use super::*;
use std::collections::HashMap;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn test_every_slot_has_env_var() {
    assert_eq!(CREDENTIAL_NAMES.len(), CREDENTIAL_ENV_VARS.len());
    for (name, env) in CREDENTIAL_ENV_VARS {
        assert!(CREDENTIAL_NAMES.contains(name));
        assert!(env.starts_with("CLOUDINBOX_"));
    }
}

#[test]
fn test_overrides_replace_config_values() {
    let mut config = Config::default();
    config.api.access_token = "from-file".into();
    apply_overrides_from(
        &mut config,
        lookup(&[
            ("CLOUDINBOX_ACCESS_TOKEN", "from-env"),
            ("CLOUDINBOX_WEBHOOK_SECRET", "hook"),
        ]),
    );
    assert_eq!(config.api.access_token, "from-env");
    assert_eq!(config.gateway.secret, "hook");
}

#[test]
fn test_empty_override_is_ignored() {
    let mut config = Config::default();
    config.api.access_token = "from-file".into();
    apply_overrides_from(&mut config, lookup(&[("CLOUDINBOX_ACCESS_TOKEN", "")]));
    assert_eq!(config.api.access_token, "from-file");
}

#[test]
fn test_unknown_slot_has_no_value() {
    let config = Config::default();
    assert!(get_credential_value(&config, "nope").is_none());
    assert_eq!(get_credential_value(&config, "access-token"), Some(""));
}

#[test]
fn test_credential_status() {
    let mut config = Config::default();
    config.gateway.secret = "hook".into();
    let status = credential_status(&config);
    assert_eq!(
        status,
        vec![("access-token", false), ("webhook-secret", true)]
    );
}

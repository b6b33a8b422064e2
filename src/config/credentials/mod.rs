use super::schema::Config;

macro_rules! define_credentials {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// All known credential slot names.
        pub const CREDENTIAL_NAMES: &[&str] = &[$($name),*];

        /// (slot name, env var name) pairs.
        pub const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Get the current value of a credential field by slot name.
        pub fn get_credential_value<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
            match name {
                $($name => Some(config.$($path).+.as_str()),)*
                _ => None,
            }
        }

        /// Apply overrides from `lookup`, keyed by env var name. Empty values
        /// are ignored.
        pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
            $(
                if let Some(val) = lookup($env)
                    && !val.is_empty()
                {
                    config.$($path).+ = val;
                }
            )*
        }
    };
}

define_credentials! {
    "access-token",   "CLOUDINBOX_ACCESS_TOKEN"   => api.access_token;
    "webhook-secret", "CLOUDINBOX_WEBHOOK_SECRET" => gateway.secret;
}

/// Apply environment variable overrides.
///
/// Any `CLOUDINBOX_*` credential variable that is set and non-empty overwrites
/// the corresponding config field, so secrets can be injected without touching
/// the config file.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |name| std::env::var(name).ok());
}

/// `(slot name, is set)` for every credential slot.
pub fn credential_status(config: &Config) -> Vec<(&'static str, bool)> {
    CREDENTIAL_NAMES
        .iter()
        .map(|&name| {
            let set = get_credential_value(config, name).is_some_and(|v| !v.is_empty());
            (name, set)
        })
        .collect()
}

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::InboxError;
use crate::window::TemplateMode;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`            printed normally via `&self.field_name`
/// - `redact(field_name)`    `String` field: shows `[empty]` or `[REDACTED]`
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Backend API
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "http://127.0.0.1:3000/api".to_string()
}

fn default_page_limit() -> u32 {
    50
}

pub const MAX_PAGE_LIMIT: u32 = 500;

#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url", rename = "baseUrl")]
    pub base_url: String,
    /// Bearer token for the inbox backend.
    #[serde(default, rename = "accessToken")]
    pub access_token: String,
    /// Messages per `getMessages` page.
    #[serde(default = "default_page_limit", rename = "pageLimit")]
    pub page_limit: u32,
}

redact_debug!(ApiConfig, base_url, redact(access_token), page_limit,);

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: String::new(),
            page_limit: default_page_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync timing
// ---------------------------------------------------------------------------

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_match_window_secs() -> u64 {
    30
}

fn default_stale_after_secs() -> u64 {
    45
}

fn default_duplicate_window_secs() -> u64 {
    3
}

fn default_template_refresh_delay_ms() -> u64 {
    400
}

fn default_eligibility_debounce_ms() -> u64 {
    500
}

pub const MIN_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_ms", rename = "pollIntervalMs")]
    pub poll_interval_ms: u64,
    /// How far apart an echo without `clientTempId` and its placeholder may be.
    #[serde(
        default = "default_match_window_secs",
        rename = "optimisticMatchWindowSecs"
    )]
    pub optimistic_match_window_secs: u64,
    /// Age after which an accepted placeholder without echo is dropped.
    #[serde(
        default = "default_stale_after_secs",
        rename = "optimisticStaleAfterSecs"
    )]
    pub optimistic_stale_after_secs: u64,
    /// Two outbound messages with the same text this close together are one.
    #[serde(
        default = "default_duplicate_window_secs",
        rename = "duplicateWindowSecs"
    )]
    pub duplicate_window_secs: u64,
    #[serde(
        default = "default_template_refresh_delay_ms",
        rename = "templateRefreshDelayMs"
    )]
    pub template_refresh_delay_ms: u64,
    #[serde(
        default = "default_eligibility_debounce_ms",
        rename = "eligibilityDebounceMs"
    )]
    pub eligibility_debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            optimistic_match_window_secs: default_match_window_secs(),
            optimistic_stale_after_secs: default_stale_after_secs(),
            duplicate_window_secs: default_duplicate_window_secs(),
            template_refresh_delay_ms: default_template_refresh_delay_ms(),
            eligibility_debounce_ms: default_eligibility_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default, rename = "templateMode")]
    pub template_mode: TemplateMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// The local operator. Messages they authored never notify, and their
    /// "delete for me" entries are hidden.
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Accounts whose notifications are turned off.
    #[serde(default, rename = "mutedAccounts")]
    pub muted_accounts: Vec<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            muted_accounts: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    18791
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// HMAC-SHA256 secret for `X-Signature-256` on realtime webhooks.
    #[serde(default)]
    pub secret: String,
}

redact_debug!(GatewayConfig, enabled, host, port, redact(secret),);

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
            secret: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), InboxError> {
        self.validate_api()?;
        self.validate_sync()?;
        self.validate_gateway()?;
        Ok(())
    }

    fn validate_api(&self) -> Result<(), InboxError> {
        let api = &self.api;
        let parsed = url::Url::parse(&api.base_url).map_err(|e| {
            InboxError::Config(format!("api.baseUrl is not a valid URL: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(InboxError::Config(format!(
                "api.baseUrl must use http or https, got {}",
                parsed.scheme()
            )));
        }
        if api.page_limit == 0 || api.page_limit > MAX_PAGE_LIMIT {
            return Err(InboxError::Config(format!(
                "api.pageLimit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        if api.access_token.is_empty() {
            warn!("api.accessToken is empty, requests will be unauthenticated");
        }
        Ok(())
    }

    fn validate_sync(&self) -> Result<(), InboxError> {
        let s = &self.sync;
        if s.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(InboxError::Config(format!(
                "sync.pollIntervalMs must be >= {MIN_POLL_INTERVAL_MS}"
            )));
        }
        if s.optimistic_match_window_secs == 0 {
            return Err(InboxError::Config(
                "sync.optimisticMatchWindowSecs must be > 0".into(),
            ));
        }
        if s.duplicate_window_secs >= s.optimistic_match_window_secs {
            return Err(InboxError::Config(
                "sync.duplicateWindowSecs must be < optimisticMatchWindowSecs".into(),
            ));
        }
        if s.optimistic_stale_after_secs == 0 {
            return Err(InboxError::Config(
                "sync.optimisticStaleAfterSecs must be > 0".into(),
            ));
        }
        if s.optimistic_stale_after_secs < s.optimistic_match_window_secs {
            warn!(
                "sync.optimisticStaleAfterSecs ({}) is shorter than the match window ({}), late echoes may reappear as duplicates",
                s.optimistic_stale_after_secs, s.optimistic_match_window_secs
            );
        }
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), InboxError> {
        let g = &self.gateway;
        if !g.enabled {
            return Ok(());
        }
        if g.port == 0 {
            return Err(InboxError::Config("gateway.port must be > 0".into()));
        }
        if g.port < 1024 {
            warn!(
                "gateway.port {} is a privileged port (< 1024), may require elevated permissions",
                g.port
            );
        }
        if g.secret.is_empty() {
            return Err(InboxError::Config(
                "gateway.secret is required when the gateway is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;

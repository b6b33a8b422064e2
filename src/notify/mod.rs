//! User-facing notifications for messages arriving outside the focused view.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

use crate::model::Message;
use crate::utils::truncate_for_log;

const PREVIEW_MAX_BYTES: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub conversation_id: String,
    pub account_id: Option<String>,
    pub message_id: String,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_message(message: &Message, account_id: Option<&str>, title: &str) -> Self {
        let body = if message.content_text.is_empty() {
            format!("[{}]", message.message_type.as_str())
        } else {
            truncate_for_log(&message.content_text, PREVIEW_MAX_BYTES)
        };
        Self {
            conversation_id: message.conversation_id.clone(),
            account_id: account_id.map(str::to_string),
            message_id: message.id.clone(),
            title: title.to_string(),
            body,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log; the default for headless use.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        info!(
            "new message in {} from {}: {}",
            notification.conversation_id, notification.title, notification.body
        );
        Ok(())
    }
}

/// Per-account notification preference.
#[derive(Debug, Clone, Default)]
pub struct NotificationPolicy {
    pub enabled: bool,
    pub muted_accounts: HashSet<String>,
}

impl NotificationPolicy {
    pub fn new(enabled: bool, muted_accounts: impl IntoIterator<Item = String>) -> Self {
        Self {
            enabled,
            muted_accounts: muted_accounts.into_iter().collect(),
        }
    }

    /// Unknown accounts follow the global switch.
    pub fn allows(&self, account_id: Option<&str>) -> bool {
        self.enabled && account_id.is_none_or(|id| !self.muted_accounts.contains(id))
    }
}

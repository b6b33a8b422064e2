use serde::{Deserialize, Serialize};

/// Scope of one message stream: a customer number on one business account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub account_id: String,
    pub client_number: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub bot_enabled: bool,
}

impl Conversation {
    pub fn title(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.client_number)
    }
}

/// Eligibility answer from `getMessagePrice`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInfo {
    pub is_free: bool,
    #[serde(default)]
    pub price_eur: Option<f64>,
    #[serde(default)]
    pub price_usd: Option<f64>,
}

impl PriceInfo {
    pub fn free() -> Self {
        Self {
            is_free: true,
            price_eur: None,
            price_usd: None,
        }
    }
}

/// One emoji reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub message_id: String,
    pub emoji: String,
    /// Customer number or operator id that reacted.
    pub reactor: String,
}

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::table::RealtimeTable;
use crate::model::{Message, MessageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// Row-change notification as delivered by the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimePayload {
    pub table: RealtimeTable,
    pub event_type: ChangeKind,
    pub new: Value,
}

/// A row of the reactions table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRow {
    pub conversation_id: String,
    pub message_id: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub reactor: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    MessageInserted(Message),
    MessageUpdated(Message),
    /// Reaction state of `message_id` changed; re-fetch it.
    ReactionChanged {
        conversation_id: String,
        message_id: String,
    },
}

impl RealtimeEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::MessageInserted(m) | Self::MessageUpdated(m) => &m.conversation_id,
            Self::ReactionChanged {
                conversation_id, ..
            } => conversation_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::MessageInserted(_) => "message_inserted",
            Self::MessageUpdated(_) => "message_updated",
            Self::ReactionChanged { .. } => "reaction_changed",
        }
    }

    /// Classify a raw payload. Reaction-typed message rows become
    /// [`RealtimeEvent::ReactionChanged`] for the message they react to.
    pub fn from_payload(payload: RealtimePayload) -> Result<Self> {
        match payload.table {
            RealtimeTable::Reactions => {
                let row: ReactionRow = serde_json::from_value(payload.new)
                    .context("invalid reactions row")?;
                Ok(Self::ReactionChanged {
                    conversation_id: row.conversation_id,
                    message_id: row.message_id,
                })
            }
            RealtimeTable::Messages => {
                let message: Message = serde_json::from_value(payload.new)
                    .context("invalid messages row")?;
                if message.message_type == MessageType::Reaction {
                    let Some(target) = message.context_message_id else {
                        bail!("reaction row {} has no target message", message.id);
                    };
                    return Ok(Self::ReactionChanged {
                        conversation_id: message.conversation_id,
                        message_id: target,
                    });
                }
                Ok(match payload.event_type {
                    ChangeKind::Insert => Self::MessageInserted(message),
                    ChangeKind::Update => Self::MessageUpdated(message),
                })
            }
        }
    }
}

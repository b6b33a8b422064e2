use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::template::TemplateSend;

/// Prefix carried by every locally generated message id until the backend
/// confirms the message.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Generate a fresh correlation id for an optimistic message.
pub fn new_client_temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4().simple())
}

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contacts,
    Template,
    Interactive,
    Reaction,
    Status,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Location => "location",
            Self::Contacts => "contacts",
            Self::Template => "template",
            Self::Interactive => "interactive",
            Self::Reaction => "reaction",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }

    /// Bookkeeping rows that are stored but never rendered as bubbles.
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Reaction | Self::Status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

impl MediaType {
    pub fn message_type(self) -> MessageType {
        match self {
            Self::Image => MessageType::Image,
            Self::Video => MessageType::Video,
            Self::Audio => MessageType::Audio,
            Self::Document => MessageType::Document,
            Self::Sticker => MessageType::Sticker,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Sticker => "sticker",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

/// Interactive payload shape: quick-reply buttons or a sectioned list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "interactiveType", rename_all = "lowercase")]
pub enum InteractiveKind {
    Button {
        buttons: Vec<ReplyButton>,
    },
    List {
        #[serde(rename = "buttonText")]
        button_text: String,
        sections: Vec<ListSection>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveData {
    #[serde(flatten)]
    pub kind: InteractiveKind,
    pub body_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_text: Option<String>,
}

/// A single message row as the backend (and the realtime channel) describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_temp_id: Option<String>,
    pub conversation_id: String,
    pub direction: Direction,
    #[serde(default)]
    pub content_text: String,
    #[serde(default = "default_message_type")]
    pub message_type: MessageType,
    #[serde(default = "default_status")]
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive_data: Option<InteractiveData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    /// Message this one refers to (reply quote or reaction target).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_message_id: Option<String>,
    /// Operator who authored an outbound message; `None` for customer messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_user_id: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_for_all: bool,
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub deleted_for_user_ids: HashSet<String>,
}

fn default_message_type() -> MessageType {
    MessageType::Text
}

fn default_status() -> MessageStatus {
    MessageStatus::Sent
}

impl Message {
    /// Build the placeholder shown while `content` is being sent.
    pub fn optimistic(
        conversation_id: &str,
        client_temp_id: &str,
        content: &OutgoingContent,
        author: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: client_temp_id.to_string(),
            client_temp_id: Some(client_temp_id.to_string()),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Outbound,
            content_text: content.preview_text(),
            message_type: content.message_type(),
            status: MessageStatus::Pending,
            timestamp: now,
            template_name: match content {
                OutgoingContent::Template(send) => Some(send.template_name.clone()),
                _ => None,
            },
            interactive_data: match content {
                OutgoingContent::Interactive(data) => Some(data.clone()),
                _ => None,
            },
            media_id: match content {
                OutgoingContent::Media { media_id, .. } => Some(media_id.clone()),
                _ => None,
            },
            context_message_id: None,
            sender_user_id: author.map(str::to_string),
            is_pinned: false,
            edited_at: None,
            deleted_for_all: false,
            deleted_for_user_ids: HashSet::new(),
        }
    }

    /// True while the message only exists locally.
    pub fn is_optimistic(&self) -> bool {
        is_temp_id(&self.id)
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }

    pub fn is_template(&self) -> bool {
        self.message_type == MessageType::Template || self.template_name.is_some()
    }

    pub fn is_hidden_for(&self, viewer: Option<&str>) -> bool {
        if self.message_type.is_hidden() {
            return true;
        }
        viewer.is_some_and(|v| self.deleted_for_user_ids.contains(v))
    }

    /// Failed outbound messages keep their bubble and offer an inline retry.
    pub fn can_retry(&self) -> bool {
        self.is_outbound() && self.status == MessageStatus::Failed && !self.deleted_for_all
    }

    pub fn authored_by(&self, user_id: Option<&str>) -> bool {
        self.is_outbound()
            && user_id.is_some()
            && self.sender_user_id.as_deref() == user_id
    }

    /// Reconstruct what the operator would send again for a retry.
    pub fn to_outgoing(&self) -> Option<OutgoingContent> {
        match self.message_type {
            MessageType::Text if !self.content_text.is_empty() => {
                Some(OutgoingContent::Text(self.content_text.clone()))
            }
            MessageType::Interactive => self
                .interactive_data
                .clone()
                .map(OutgoingContent::Interactive),
            MessageType::Image
            | MessageType::Video
            | MessageType::Audio
            | MessageType::Document
            | MessageType::Sticker => {
                let media_type = match self.message_type {
                    MessageType::Image => MediaType::Image,
                    MessageType::Video => MediaType::Video,
                    MessageType::Audio => MediaType::Audio,
                    MessageType::Sticker => MediaType::Sticker,
                    _ => MediaType::Document,
                };
                self.media_id.clone().map(|media_id| OutgoingContent::Media {
                    media_type,
                    media_id,
                    caption: (!self.content_text.is_empty()).then(|| self.content_text.clone()),
                })
            }
            _ => None,
        }
    }
}

/// Everything the operator can send. Also serves as the draft restored to the
/// compose area when a send is rolled back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum OutgoingContent {
    Text(String),
    Media {
        media_type: MediaType,
        media_id: String,
        caption: Option<String>,
    },
    Interactive(InteractiveData),
    Template(TemplateSend),
}

impl OutgoingContent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text(_) => MessageType::Text,
            Self::Media { media_type, .. } => media_type.message_type(),
            Self::Interactive(_) => MessageType::Interactive,
            Self::Template(_) => MessageType::Template,
        }
    }

    /// Text used for the optimistic bubble and for heuristic echo matching.
    pub fn preview_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Media { caption, .. } => caption.clone().unwrap_or_default(),
            Self::Interactive(data) => data.body_text.clone(),
            Self::Template(send) => send.preview.clone().unwrap_or_default(),
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Media { media_id, .. } => media_id.is_empty(),
            Self::Interactive(data) => data.body_text.trim().is_empty(),
            Self::Template(send) => send.template_name.is_empty(),
        }
    }
}

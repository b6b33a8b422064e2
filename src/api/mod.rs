//! Backend contract consumed by the engine.
//!
//! [`InboxApi`] is the seam between the sync engine and the inbox backend; the
//! production implementation is [`http::HttpInboxApi`]. No send call returns the
//! persisted message: confirmation always arrives through a poll or the
//! realtime channel.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::InboxResult;
use crate::model::{
    Conversation, InteractiveData, MediaType, Message, MessageTemplate, OutgoingContent,
    PriceInfo, Reaction, TemplateSend,
};

pub use http::HttpInboxApi;

/// Arguments of `getMessages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Only messages strictly older than this.
    pub before: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl PageQuery {
    pub fn latest(limit: u32) -> Self {
        Self {
            before: None,
            limit,
        }
    }

    pub fn before(before: DateTime<Utc>, limit: u32) -> Self {
        Self {
            before: Some(before),
            limit,
        }
    }
}

/// Arguments of `sendMediaMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRequest {
    pub conversation_id: String,
    pub media_type: MediaType,
    pub media_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Arguments of `sendInteractiveMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveRequest {
    pub conversation_id: String,
    #[serde(flatten)]
    pub data: InteractiveData,
}

#[async_trait]
pub trait InboxApi: Send + Sync {
    async fn get_conversation(&self, conversation_id: &str) -> InboxResult<Conversation>;

    /// Newest-first bounded page; the engine does not rely on the order.
    async fn get_messages(
        &self,
        conversation_id: &str,
        query: PageQuery,
    ) -> InboxResult<Vec<Message>>;

    async fn send_message(
        &self,
        conversation_id: &str,
        client_temp_id: &str,
        text: &str,
    ) -> InboxResult<()>;

    async fn send_media_message(
        &self,
        client_temp_id: &str,
        request: &MediaRequest,
    ) -> InboxResult<()>;

    async fn send_interactive_message(
        &self,
        client_temp_id: &str,
        request: &InteractiveRequest,
    ) -> InboxResult<()>;

    async fn send_template_message(
        &self,
        conversation_id: &str,
        client_temp_id: &str,
        template: &TemplateSend,
    ) -> InboxResult<()>;

    async fn get_message_price(&self, conversation_id: &str) -> InboxResult<PriceInfo>;

    async fn get_available_templates(
        &self,
        conversation_id: &str,
    ) -> InboxResult<Vec<MessageTemplate>>;

    async fn get_reactions(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> InboxResult<Vec<Reaction>>;
}

/// Route `content` to the matching send call.
pub async fn dispatch_send(
    api: &dyn InboxApi,
    conversation_id: &str,
    client_temp_id: &str,
    content: &OutgoingContent,
) -> InboxResult<()> {
    match content {
        OutgoingContent::Text(text) => {
            api.send_message(conversation_id, client_temp_id, text).await
        }
        OutgoingContent::Media {
            media_type,
            media_id,
            caption,
        } => {
            let request = MediaRequest {
                conversation_id: conversation_id.to_string(),
                media_type: *media_type,
                media_id: media_id.clone(),
                caption: caption.clone(),
            };
            api.send_media_message(client_temp_id, &request).await
        }
        OutgoingContent::Interactive(data) => {
            let request = InteractiveRequest {
                conversation_id: conversation_id.to_string(),
                data: data.clone(),
            };
            api.send_interactive_message(client_temp_id, &request).await
        }
        OutgoingContent::Template(template) => {
            api.send_template_message(conversation_id, client_temp_id, template)
                .await
        }
    }
}

// Shared test helpers; not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use cloudinbox::api::{InboxApi, InteractiveRequest, MediaRequest, PageQuery};
use cloudinbox::bus::RealtimeHub;
use cloudinbox::engine::{Engine, EngineSettings};
use cloudinbox::errors::{InboxError, InboxResult};
use cloudinbox::model::{
    Conversation, Direction, Message, MessageStatus, MessageTemplate, MessageType,
    OutgoingContent, PriceInfo, Reaction, TemplateSend,
};
use cloudinbox::notify::{Notification, Notifier};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const CONV: &str = "conv-1";
pub const AGENT: &str = "agent-1";

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn customer_message(id: &str, text: &str, timestamp: DateTime<Utc>) -> Message {
    Message {
        id: id.to_string(),
        client_temp_id: None,
        conversation_id: CONV.to_string(),
        direction: Direction::Inbound,
        content_text: text.to_string(),
        message_type: MessageType::Text,
        status: MessageStatus::Delivered,
        timestamp,
        template_name: None,
        interactive_data: None,
        media_id: None,
        context_message_id: None,
        sender_user_id: None,
        is_pinned: false,
        edited_at: None,
        deleted_for_all: false,
        deleted_for_user_ids: HashSet::new(),
    }
}

#[derive(Default)]
pub struct Backend {
    pub messages: Vec<Message>,
    pub price: Option<PriceInfo>,
    pub templates: Vec<MessageTemplate>,
    pub fail_sends: bool,
    /// Temp ids of accepted sends, in order.
    pub accepted: Vec<String>,
    pub price_calls: usize,
}

/// In-memory inbox backend. Accepted sends are not persisted; tests decide
/// when (and through which path) the server row shows up.
#[derive(Default)]
pub struct FakeInbox {
    pub backend: Mutex<Backend>,
}

impl FakeInbox {
    pub fn new(configure: impl FnOnce(&mut Backend)) -> Arc<Self> {
        let inbox = Self::default();
        configure(&mut inbox.backend.lock().unwrap());
        Arc::new(inbox)
    }

    pub fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }

    /// Persist the server copy of an accepted send.
    pub fn persist_echo(&self, temp_id: &str, id: &str, text: &str) -> Message {
        let mut echo = Message::optimistic(
            CONV,
            temp_id,
            &OutgoingContent::Text(text.to_string()),
            Some(AGENT),
            Utc::now(),
        );
        echo.id = id.to_string();
        echo.status = MessageStatus::Sent;
        self.backend().messages.push(echo.clone());
        echo
    }

    fn accept(&self, client_temp_id: &str) -> InboxResult<()> {
        let mut backend = self.backend();
        if backend.fail_sends {
            return Err(InboxError::network("connection reset"));
        }
        backend.accepted.push(client_temp_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl InboxApi for FakeInbox {
    async fn get_conversation(&self, conversation_id: &str) -> InboxResult<Conversation> {
        Ok(Conversation {
            id: conversation_id.to_string(),
            account_id: "acct-1".to_string(),
            client_number: "+34600000001".to_string(),
            display_name: None,
            unread_count: 0,
            is_favorite: false,
            bot_enabled: false,
        })
    }

    async fn get_messages(
        &self,
        conversation_id: &str,
        query: PageQuery,
    ) -> InboxResult<Vec<Message>> {
        let backend = self.backend();
        let mut page: Vec<Message> = backend
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| query.before.is_none_or(|before| m.timestamp < before))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        page.truncate(query.limit as usize);
        Ok(page)
    }

    async fn send_message(&self, _: &str, client_temp_id: &str, _: &str) -> InboxResult<()> {
        self.accept(client_temp_id)
    }

    async fn send_media_message(&self, client_temp_id: &str, _: &MediaRequest) -> InboxResult<()> {
        self.accept(client_temp_id)
    }

    async fn send_interactive_message(
        &self,
        client_temp_id: &str,
        _: &InteractiveRequest,
    ) -> InboxResult<()> {
        self.accept(client_temp_id)
    }

    async fn send_template_message(
        &self,
        _: &str,
        client_temp_id: &str,
        _: &TemplateSend,
    ) -> InboxResult<()> {
        self.accept(client_temp_id)
    }

    async fn get_message_price(&self, _: &str) -> InboxResult<PriceInfo> {
        let mut backend = self.backend();
        backend.price_calls += 1;
        Ok(backend.price.unwrap_or_else(PriceInfo::free))
    }

    async fn get_available_templates(&self, _: &str) -> InboxResult<Vec<MessageTemplate>> {
        Ok(self.backend().templates.clone())
    }

    async fn get_reactions(&self, _: &str, _: &str) -> InboxResult<Vec<Reaction>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        poll_interval: std::time::Duration::from_secs(3600),
        viewer: Some(AGENT.to_string()),
        ..EngineSettings::default()
    }
}

pub struct Inbox {
    pub engine: Engine,
    pub api: Arc<FakeInbox>,
    pub hub: Arc<RealtimeHub>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn inbox(api: Arc<FakeInbox>) -> Inbox {
    let hub = Arc::new(RealtimeHub::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Engine::new(api.clone(), hub.clone(), notifier.clone(), settings());
    Inbox {
        engine,
        api,
        hub,
        notifier,
    }
}

pub fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content_text.as_str()).collect()
}

//! Message builders shared by unit tests across modules.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashSet;

use super::{Direction, Message, MessageStatus, MessageType};

pub const CONV: &str = "conv-1";

/// Fixed reference instant plus `secs` seconds.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn message(id: &str, direction: Direction, text: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        client_temp_id: None,
        conversation_id: CONV.to_string(),
        direction,
        content_text: text.to_string(),
        message_type: MessageType::Text,
        status: MessageStatus::Sent,
        timestamp: ts(secs),
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

pub fn inbound(id: &str, text: &str, secs: i64) -> Message {
    message(id, Direction::Inbound, text, secs)
}

pub fn outbound(id: &str, text: &str, secs: i64) -> Message {
    let mut msg = message(id, Direction::Outbound, text, secs);
    msg.sender_user_id = Some("agent-1".to_string());
    msg
}

/// Server echo of an optimistic message, carrying its correlation id.
pub fn echo(id: &str, temp_id: &str, text: &str, secs: i64) -> Message {
    let mut msg = outbound(id, text, secs);
    msg.client_temp_id = Some(temp_id.to_string());
    msg
}

pub fn template_sent(id: &str, name: &str, secs: i64) -> Message {
    let mut msg = outbound(id, "", secs);
    msg.message_type = MessageType::Template;
    msg.template_name = Some(name.to_string());
    msg
}

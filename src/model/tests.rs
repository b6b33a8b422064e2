use super::fixtures::{inbound, outbound, ts};
use super::*;
use serde_json::json;

fn greeting_template() -> MessageTemplate {
    serde_json::from_value(json!({
        "name": "order_update",
        "language": "en_US",
        "category": "UTILITY",
        "components": [
            {"type": "HEADER", "format": "TEXT", "text": "Order {{1}}"},
            {"type": "BODY", "text": "Hi {{1}}, your order ships on {{2}}."},
            {"type": "FOOTER", "text": "Reply STOP to opt out"},
            {"type": "BUTTONS", "buttons": [{"type": "QUICK_REPLY", "text": "Thanks"}]}
        ]
    }))
    .unwrap()
}

#[test]
fn test_message_deserializes_backend_row() {
    let msg: Message = serde_json::from_value(json!({
        "id": "wamid.123",
        "clientTempId": "temp-abc",
        "conversationId": "conv-1",
        "direction": "outbound",
        "contentText": "hello",
        "messageType": "text",
        "status": "delivered",
        "timestamp": "2025-03-01T12:00:00Z",
        "deletedForUserIds": ["agent-2"]
    }))
    .unwrap();

    assert_eq!(msg.id, "wamid.123");
    assert_eq!(msg.client_temp_id.as_deref(), Some("temp-abc"));
    assert_eq!(msg.status, MessageStatus::Delivered);
    assert_eq!(msg.timestamp, ts(0));
    assert!(msg.deleted_for_user_ids.contains("agent-2"));
    assert!(!msg.is_optimistic());
}

#[test]
fn test_unknown_message_type_maps_to_unknown() {
    let msg: Message = serde_json::from_value(json!({
        "id": "1",
        "conversationId": "conv-1",
        "direction": "inbound",
        "messageType": "ephemeral_poll",
        "timestamp": "2025-03-01T12:00:00Z"
    }))
    .unwrap();
    assert_eq!(msg.message_type, MessageType::Unknown);
    assert_eq!(msg.status, MessageStatus::Sent);
}

#[test]
fn test_temp_ids_are_unique_and_prefixed() {
    let a = new_client_temp_id();
    let b = new_client_temp_id();
    assert_ne!(a, b);
    assert!(is_temp_id(&a));
    assert!(a.starts_with(TEMP_ID_PREFIX));
    assert!(!is_temp_id("wamid.HBgM"));
}

#[test]
fn test_optimistic_message_from_text() {
    let content = OutgoingContent::Text("hello".to_string());
    let msg = Message::optimistic("conv-1", "temp-1", &content, Some("agent-1"), ts(5));
    assert_eq!(msg.id, "temp-1");
    assert_eq!(msg.client_temp_id.as_deref(), Some("temp-1"));
    assert_eq!(msg.status, MessageStatus::Pending);
    assert_eq!(msg.content_text, "hello");
    assert_eq!(msg.message_type, MessageType::Text);
    assert!(msg.is_optimistic());
    assert!(msg.authored_by(Some("agent-1")));
}

#[test]
fn test_optimistic_message_from_template_uses_preview() {
    let send = greeting_template().to_send(&[
        "#42".to_string(),
        "Ana".to_string(),
        "Friday".to_string(),
    ]);
    let content = OutgoingContent::Template(send);
    let msg = Message::optimistic("conv-1", "temp-2", &content, None, ts(0));
    assert_eq!(msg.message_type, MessageType::Template);
    assert_eq!(msg.template_name.as_deref(), Some("order_update"));
    assert_eq!(msg.content_text, "Hi Ana, your order ships on Friday.");
    assert!(msg.is_template());
}

#[test]
fn test_hidden_rows() {
    let mut reaction = inbound("r1", "👍", 0);
    reaction.message_type = MessageType::Reaction;
    assert!(reaction.is_hidden_for(None));

    let mut deleted = outbound("m1", "oops", 0);
    deleted.deleted_for_user_ids.insert("agent-1".to_string());
    assert!(deleted.is_hidden_for(Some("agent-1")));
    assert!(!deleted.is_hidden_for(Some("agent-2")));
    assert!(!deleted.is_hidden_for(None));
}

#[test]
fn test_can_retry_only_failed_outbound() {
    let mut msg = outbound("m1", "hi", 0);
    assert!(!msg.can_retry());
    msg.status = MessageStatus::Failed;
    assert!(msg.can_retry());
    assert_eq!(msg.to_outgoing(), Some(OutgoingContent::Text("hi".to_string())));

    let mut inbound_failed = inbound("m2", "hi", 0);
    inbound_failed.status = MessageStatus::Failed;
    assert!(!inbound_failed.can_retry());
}

#[test]
fn test_media_message_to_outgoing() {
    let mut msg = outbound("m1", "receipt", 0);
    msg.message_type = MessageType::Document;
    msg.media_id = Some("media-9".to_string());
    assert_eq!(
        msg.to_outgoing(),
        Some(OutgoingContent::Media {
            media_type: MediaType::Document,
            media_id: "media-9".to_string(),
            caption: Some("receipt".to_string()),
        })
    );
}

#[test]
fn test_interactive_data_wire_shape() {
    let data = InteractiveData {
        kind: InteractiveKind::Button {
            buttons: vec![ReplyButton {
                id: "yes".to_string(),
                title: "Yes".to_string(),
            }],
        },
        body_text: "Confirm?".to_string(),
        header_text: None,
        footer_text: Some("Shop".to_string()),
    };
    let value = serde_json::to_value(&data).unwrap();
    assert_eq!(value["interactiveType"], "button");
    assert_eq!(value["bodyText"], "Confirm?");
    assert_eq!(value["buttons"][0]["id"], "yes");
    assert_eq!(value["footerText"], "Shop");
    let back: InteractiveData = serde_json::from_value(value).unwrap();
    assert_eq!(back, data);
}

#[test]
fn test_outgoing_content_is_empty() {
    assert!(OutgoingContent::Text("   ".to_string()).is_empty());
    assert!(!OutgoingContent::Text("x".to_string()).is_empty());
}

#[test]
fn test_template_placeholder_count() {
    let template = greeting_template();
    // header {{1}} + body {{1}},{{2}}
    assert_eq!(template.placeholder_count(), 3);
    assert_eq!(template::placeholder_count("no vars"), 0);
    assert_eq!(template::placeholder_count("{{3}} then {{1}}"), 3);
}

#[test]
fn test_template_render_keeps_missing_placeholders() {
    let template = greeting_template();
    assert_eq!(
        template.render_body(&["Ana".to_string()]),
        "Hi Ana, your order ships on {{2}}."
    );
}

#[test]
fn test_template_to_send_builds_components_in_order() {
    let template = greeting_template();
    let send = template.to_send(&[
        "#42".to_string(),
        "Ana".to_string(),
        "Friday".to_string(),
    ]);
    assert_eq!(send.template_name, "order_update");
    assert_eq!(send.language_code, "en_US");
    let components = send.components.unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0]["type"], "header");
    assert_eq!(components[0]["parameters"][0]["text"], "#42");
    assert_eq!(components[1]["type"], "body");
    assert_eq!(components[1]["parameters"][0]["text"], "Ana");
    assert_eq!(components[1]["parameters"][1]["text"], "Friday");
}

#[test]
fn test_template_without_variables_has_no_components() {
    let template: MessageTemplate = serde_json::from_value(json!({
        "name": "hello_world",
        "language": "en_US",
        "components": [{"type": "BODY", "text": "Hello!"}]
    }))
    .unwrap();
    let send = template.to_send(&[]);
    assert!(send.components.is_none());
    assert_eq!(send.preview.as_deref(), Some("Hello!"));
}

#[test]
fn test_conversation_title_falls_back_to_number() {
    let conv = Conversation {
        id: "c1".to_string(),
        account_id: "acc".to_string(),
        client_number: "+34600000000".to_string(),
        display_name: Some("  ".to_string()),
        unread_count: 0,
        is_favorite: false,
        bot_enabled: false,
    };
    assert_eq!(conv.title(), "+34600000000");
}

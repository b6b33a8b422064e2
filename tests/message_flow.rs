mod common;

use common::{AGENT, CONV, FakeInbox, at, customer_message, inbox, texts};
use cloudinbox::bus::RealtimeEvent;
use cloudinbox::engine::EngineEvent;
use cloudinbox::model::{MessageStatus, OutgoingContent, PriceInfo};
use cloudinbox::window::WindowMode;
use std::time::Duration;
use tokio::sync::broadcast;

async fn wait_for(
    events: &mut broadcast::Receiver<EngineEvent>,
    wanted: impl Fn(&EngineEvent) -> bool,
) -> EngineEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.unwrap();
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("engine event not observed in time")
}

fn not_free() -> Option<PriceInfo> {
    Some(PriceInfo {
        is_free: false,
        price_eur: Some(0.06),
        price_usd: None,
    })
}

#[tokio::test]
async fn test_placeholder_replaced_by_realtime_echo() {
    let t = inbox(FakeInbox::new(|b| {
        b.messages.push(customer_message("in-1", "hola", at(0)));
    }));
    t.engine.open(CONV).await.unwrap();
    let mut events = t.engine.subscribe();

    let temp_id = t.engine.send_text("hello").await.unwrap();
    let visible = t.engine.visible_messages().await;
    assert_eq!(texts(&visible), vec!["hola", "hello"]);
    assert_eq!(visible[1].status, MessageStatus::Pending);
    assert_eq!(t.api.backend().accepted, vec![temp_id.clone()]);

    let echo = t.api.persist_echo(&temp_id, "srv-1", "hello");
    t.hub
        .publish(RealtimeEvent::MessageInserted(echo))
        .await
        .unwrap();
    wait_for(&mut events, |e| *e == EngineEvent::MessagesChanged).await;

    let visible = t.engine.visible_messages().await;
    assert_eq!(visible.len(), 2);
    assert_eq!(visible[1].id, "srv-1");
    assert_eq!(visible[1].client_temp_id.as_deref(), Some(temp_id.as_str()));
}

#[tokio::test]
async fn test_echo_arriving_by_poll_and_realtime_is_shown_once() {
    let t = inbox(FakeInbox::new(|_| {}));
    t.engine.open(CONV).await.unwrap();

    let temp_id = t.engine.send_text("hello").await.unwrap();
    let echo = t.api.persist_echo(&temp_id, "srv-1", "hello");
    assert!(t.engine.poll_once().await.unwrap());

    let mut events = t.engine.subscribe();
    t.hub
        .publish(RealtimeEvent::MessageUpdated(echo))
        .await
        .unwrap();
    // the update carries nothing new; give the consumer a moment to apply it
    let _ = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;

    let visible = t.engine.visible_messages().await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "srv-1");
}

#[tokio::test]
async fn test_failed_send_rolls_back_and_restores_draft() {
    let t = inbox(FakeInbox::new(|b| b.fail_sends = true));
    t.engine.open(CONV).await.unwrap();

    let failure = t.engine.send_text("hello").await.unwrap_err();
    assert!(failure.error.is_retryable());
    assert!(t.engine.visible_messages().await.is_empty());
    assert_eq!(
        t.engine.draft().await,
        Some(OutgoingContent::Text("hello".to_string()))
    );
}

#[tokio::test]
async fn test_customer_reply_reopens_window() {
    let t = inbox(FakeInbox::new(|b| b.price = not_free()));
    t.engine.open(CONV).await.unwrap();
    assert_eq!(
        t.engine.window().await.mode,
        WindowMode::ManualSelectingTemplate
    );

    let mut events = t.engine.subscribe();
    t.api.backend().price = Some(PriceInfo::free());
    t.hub
        .publish(RealtimeEvent::MessageInserted(customer_message(
            "in-2",
            "sigo aqui",
            chrono::Utc::now(),
        )))
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| matches!(e, EngineEvent::WindowChanged(_))).await;
    assert_eq!(event, EngineEvent::WindowChanged(WindowMode::Free));
    assert!(t.engine.window().await.templates.is_none());
}

#[tokio::test]
async fn test_unfocused_view_notifies_customer_messages_only() {
    let t = inbox(FakeInbox::new(|_| {}));
    t.engine.open(CONV).await.unwrap();
    t.engine.set_focused(false);
    let mut events = t.engine.subscribe();

    t.hub
        .publish(RealtimeEvent::MessageInserted(customer_message(
            "in-1",
            "hola",
            at(0),
        )))
        .await
        .unwrap();
    wait_for(&mut events, |e| *e == EngineEvent::MessagesChanged).await;

    let echo = t.api.persist_echo("tmp-own", "srv-9", "from another tab");
    assert_eq!(echo.sender_user_id.as_deref(), Some(AGENT));
    t.hub
        .publish(RealtimeEvent::MessageInserted(echo))
        .await
        .unwrap();
    wait_for(&mut events, |e| *e == EngineEvent::MessagesChanged).await;

    let seen = t.notifier.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].title, "+34600000001");
    assert_eq!(seen[0].body, "hola");
}

#[tokio::test]
async fn test_switching_conversation_ignores_old_stream() {
    let t = inbox(FakeInbox::new(|_| {}));
    t.engine.open(CONV).await.unwrap();
    t.engine.open("conv-2").await.unwrap();

    t.hub
        .publish(RealtimeEvent::MessageInserted(customer_message(
            "in-1",
            "late",
            at(0),
        )))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(t.engine.visible_messages().await.is_empty());
    assert_eq!(t.engine.active_conversation().await.as_deref(), Some("conv-2"));
}

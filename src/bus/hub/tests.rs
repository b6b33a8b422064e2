use super::*;
use crate::model::fixtures::inbound;

fn inserted(conversation_id: &str, id: &str) -> RealtimeEvent {
    let mut message = inbound(id, "hola", 0);
    message.conversation_id = conversation_id.to_string();
    RealtimeEvent::MessageInserted(message)
}

#[tokio::test]
async fn test_publish_reaches_matching_subscription() {
    let hub = RealtimeHub::default();
    let mut sub = hub.subscribe("conv-1");
    assert_eq!(sub.conversation_id(), "conv-1");

    let delivered = hub.publish(inserted("conv-1", "1")).await.unwrap();
    assert_eq!(delivered, 1);
    let event = sub.recv().await.unwrap();
    assert_eq!(event.conversation_id(), "conv-1");
}

#[tokio::test]
async fn test_no_cross_conversation_delivery() {
    let hub = RealtimeHub::default();
    let mut sub = hub.subscribe("conv-1");
    assert_eq!(hub.publish(inserted("conv-2", "1")).await.unwrap(), 0);
    assert!(sub.rx.try_recv().is_err());
}

#[tokio::test]
async fn test_drop_unsubscribes() {
    let hub = RealtimeHub::default();
    let sub = hub.subscribe("conv-1");
    let other = hub.subscribe("conv-1");
    assert_eq!(hub.subscriber_count("conv-1"), 2);
    drop(sub);
    assert_eq!(hub.subscriber_count("conv-1"), 1);
    drop(other);
    assert_eq!(hub.subscriber_count("conv-1"), 0);
}

#[tokio::test]
async fn test_rate_limit_per_conversation() {
    let hub = RealtimeHub::new(2, 60.0, 16);
    let _sub = hub.subscribe("conv-1");
    hub.publish(inserted("conv-1", "1")).await.unwrap();
    hub.publish(inserted("conv-1", "2")).await.unwrap();
    let err = hub.publish(inserted("conv-1", "3")).await.unwrap_err();
    assert!(err.to_string().contains("Rate limit exceeded"));

    // other conversations have their own budget
    hub.publish(inserted("conv-2", "1")).await.unwrap();
}

#[tokio::test]
async fn test_subscription_outliving_hub() {
    let hub = RealtimeHub::default();
    let mut sub = hub.subscribe("conv-1");
    drop(hub);
    assert!(sub.recv().await.is_none());
}

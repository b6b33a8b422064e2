use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::events::RealtimeEvent;

const DEFAULT_RATE_LIMIT: usize = 120;
const DEFAULT_RATE_WINDOW_S: f64 = 60.0;
const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 256;
/// Timeout for delivering to one subscriber so a stalled consumer cannot block
/// the publisher.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of tracked conversations before forced pruning
const MAX_TRACKED_CONVERSATIONS: usize = 5000;

/// Anything the engine can subscribe to for realtime events.
pub trait RealtimeSource: Send + Sync {
    /// Open a subscription delivering events for `conversation_id` only.
    /// Dropping the subscription unsubscribes.
    fn subscribe(&self, conversation_id: &str) -> Subscription;
}

type Subscribers = HashMap<String, Vec<(u64, mpsc::Sender<RealtimeEvent>)>>;

#[derive(Default)]
struct HubState {
    subscribers: Subscribers,
    publish_timestamps: HashMap<String, Vec<Instant>>,
}

/// In-process fan-out of realtime events keyed by conversation id.
pub struct RealtimeHub {
    state: Arc<Mutex<HubState>>,
    next_id: AtomicU64,
    capacity: usize,
    rate_limit: usize,
    rate_window: Duration,
}

impl RealtimeHub {
    pub fn new(rate_limit: usize, rate_window_secs: f64, capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            rate_limit,
            rate_window: Duration::from_secs_f64(rate_window_secs),
        }
    }

    pub fn subscriber_count(&self, conversation_id: &str) -> usize {
        self.lock()
            .subscribers
            .get(conversation_id)
            .map_or(0, Vec::len)
    }

    /// Deliver `event` to every subscription for its conversation. Returns the
    /// number of subscribers reached.
    pub async fn publish(&self, event: RealtimeEvent) -> Result<usize> {
        let conversation_id = event.conversation_id().to_string();
        let targets = {
            let mut state = self.lock();
            let now = Instant::now();
            let rate_window = self.rate_window;
            let timestamps = state
                .publish_timestamps
                .entry(conversation_id.clone())
                .or_default();
            let cutoff = now.checked_sub(rate_window).unwrap_or(now);
            timestamps.retain(|&t| t > cutoff);
            if timestamps.len() >= self.rate_limit {
                warn!(
                    "realtime rate limit hit for {} ({}/{:.0}s), dropping event",
                    conversation_id,
                    self.rate_limit,
                    rate_window.as_secs_f64()
                );
                return Err(anyhow::anyhow!(
                    "Rate limit exceeded for conversation {}",
                    conversation_id
                ));
            }
            timestamps.push(now);

            // Prune idle conversations to prevent unbounded growth
            if state.publish_timestamps.len() > MAX_TRACKED_CONVERSATIONS {
                state
                    .publish_timestamps
                    .retain(|_, ts| ts.iter().any(|&t| now.duration_since(t) < rate_window));
            }

            state
                .subscribers
                .get(&conversation_id)
                .map(|subs| subs.iter().map(|(_, tx)| tx.clone()).collect::<Vec<_>>())
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for tx in targets {
            match tokio::time::timeout(SEND_TIMEOUT, tx.send(event.clone())).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(_)) => debug!("subscriber for {} already closed", conversation_id),
                Err(_) => warn!(
                    "realtime delivery to {} timed out after {}s",
                    conversation_id,
                    SEND_TIMEOUT.as_secs()
                ),
            }
        }
        debug!(
            "{} event for {} delivered to {} subscriber(s)",
            event.kind(),
            conversation_id,
            delivered
        );
        Ok(delivered)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new(
            DEFAULT_RATE_LIMIT,
            DEFAULT_RATE_WINDOW_S,
            DEFAULT_SUBSCRIPTION_CAPACITY,
        )
    }
}

impl RealtimeSource for RealtimeHub {
    fn subscribe(&self, conversation_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .subscribers
            .entry(conversation_id.to_string())
            .or_default()
            .push((id, tx));
        debug!("subscribed to realtime events for {}", conversation_id);
        let state = Arc::downgrade(&self.state);
        let conversation = conversation_id.to_string();
        Subscription::new(
            conversation_id,
            rx,
            Box::new(move || {
                let Some(state) = state.upgrade() else {
                    return;
                };
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(subs) = state.subscribers.get_mut(&conversation) {
                    subs.retain(|(sub_id, _)| *sub_id != id);
                    if subs.is_empty() {
                        state.subscribers.remove(&conversation);
                    }
                }
                debug!("unsubscribed from realtime events for {}", conversation);
            }),
        )
    }
}

/// Receiving end of a conversation-scoped subscription.
pub struct Subscription {
    conversation_id: String,
    rx: mpsc::Receiver<RealtimeEvent>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        conversation_id: &str,
        rx: mpsc::Receiver<RealtimeEvent>,
        on_drop: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            rx,
            on_drop: Some(on_drop),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Next event, or `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<RealtimeEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

#[cfg(test)]
mod tests;

//! Periodic polling and page loads for the active conversation.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::{Engine, POLLER_TASK, no_active_conversation};

/// Cursors are sent with millisecond precision; one step past a timestamp
/// includes it in a strictly-older query.
const CURSOR_STEP: chrono::Duration = chrono::Duration::milliseconds(1);
use crate::api::PageQuery;
use crate::errors::{InboxError, InboxResult};
use crate::sync::Activation;

/// Releases the single-flight slot when a poll finishes or is cancelled, unless
/// a newer activation has already taken it over.
struct InFlight<'a> {
    slot: &'a AtomicU64,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self.slot.compare_exchange(
            self.generation,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl Engine {
    pub(super) async fn start_poller(&self, activation: &Activation) {
        let engine = self.clone();
        let activation = activation.clone();
        self.shared
            .tasks
            .spawn(POLLER_TASK, async move {
                engine.poll_loop(activation).await;
            })
            .await;
    }

    async fn poll_loop(&self, activation: Activation) {
        let mut focused = self.shared.focused.subscribe();
        let mut ticker = interval(self.shared.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately and the page was just loaded by open()
        ticker.tick().await;

        loop {
            if !*focused.borrow_and_update() {
                debug!("poller paused for {}", activation.conversation_id);
                if focused.wait_for(|f| *f).await.is_err() {
                    return;
                }
                debug!("poller resumed for {}", activation.conversation_id);
                ticker.reset();
            } else {
                ticker.tick().await;
                if !*focused.borrow() {
                    continue;
                }
            }

            match self.poll_for(&activation).await {
                Ok(_) => {}
                Err(InboxError::StaleConversation { .. }) => {
                    debug!("poller for {} superseded", activation.conversation_id);
                    return;
                }
                Err(e) => warn!("poll failed for {}: {}", activation.conversation_id, e),
            }
        }
    }

    /// Fetch the newest page once and merge it. Returns `false` without fetching
    /// when another poll is still in flight.
    pub async fn poll_once(&self) -> InboxResult<bool> {
        let activation = self.current_activation().await?;
        self.poll_for(&activation).await
    }

    async fn poll_for(&self, activation: &Activation) -> InboxResult<bool> {
        let slot = &self.shared.poll_in_flight;
        let generation = activation.generation;
        // a poll left over from a previous activation does not block this one
        let previous = slot.load(Ordering::Acquire);
        if previous == generation
            || slot
                .compare_exchange(previous, generation, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            debug!("poll skipped, previous poll still in flight");
            return Ok(false);
        }
        let _guard = InFlight { slot, generation };

        let requested_at = Utc::now();
        let page = self
            .shared
            .api
            .get_messages(
                &activation.conversation_id,
                PageQuery::latest(self.shared.settings.page_limit),
            )
            .await?;
        let applied = self
            .shared
            .state
            .lock()
            .await
            .apply_poll(activation, page, requested_at, Utc::now())?;
        self.after_apply(activation, applied).await;
        Ok(true)
    }

    /// Reload the newest page with replace semantics: messages inside the page's
    /// time range that the backend no longer returns are dropped.
    pub async fn refresh(&self) -> InboxResult<()> {
        let activation = self.current_activation().await?;
        self.refresh_for(&activation).await
    }

    pub(super) async fn refresh_for(&self, activation: &Activation) -> InboxResult<()> {
        let page = self
            .shared
            .api
            .get_messages(
                &activation.conversation_id,
                PageQuery::latest(self.shared.settings.page_limit),
            )
            .await?;
        let applied = self
            .shared
            .state
            .lock()
            .await
            .apply_refresh(activation, page)?;
        self.after_apply(activation, applied).await;
        Ok(())
    }

    /// Load the page preceding the oldest loaded message. Returns `true` once
    /// the beginning of the history has been reached.
    ///
    /// The cursor includes the oldest loaded timestamp so a page boundary cannot
    /// split messages that share it; the merge drops the ones already loaded.
    /// A full page made only of such messages steps past that timestamp.
    pub async fn load_older(&self) -> InboxResult<bool> {
        let (activation, oldest) = {
            let state = self.shared.state.lock().await;
            let activation = state.active().cloned();
            (activation, state.store().oldest_timestamp())
        };
        let activation = activation.ok_or_else(no_active_conversation)?;
        let limit = self.shared.settings.page_limit;
        let conversation_id = &activation.conversation_id;
        let full = |page: &[crate::model::Message]| page.len() >= limit as usize;
        let (page, exhausted) = match oldest {
            Some(ts) => {
                let mut page = self
                    .shared
                    .api
                    .get_messages(conversation_id, PageQuery::before(ts + CURSOR_STEP, limit))
                    .await?;
                if full(&page) && page.iter().all(|m| m.timestamp >= ts) {
                    debug!(
                        "page of {} holds only messages at the cursor, stepping past it",
                        conversation_id
                    );
                    let older = self
                        .shared
                        .api
                        .get_messages(conversation_id, PageQuery::before(ts, limit))
                        .await?;
                    let exhausted = !full(&older);
                    page.extend(older);
                    (page, exhausted)
                } else {
                    let exhausted = !full(&page);
                    (page, exhausted)
                }
            }
            None => {
                let page = self
                    .shared
                    .api
                    .get_messages(conversation_id, PageQuery::latest(limit))
                    .await?;
                let exhausted = !full(&page);
                (page, exhausted)
            }
        };
        let applied = self
            .shared
            .state
            .lock()
            .await
            .apply_batch(&activation, page)?;
        self.after_apply(&activation, applied).await;
        Ok(exhausted)
    }
}

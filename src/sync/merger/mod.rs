//! Reconciliation of authoritative messages against the store.
//!
//! Every authoritative message (poll page, realtime event, refresh) goes through
//! [`merge_message`]. Matching runs in a fixed order:
//!
//! 1. same `id` as a stored entry: replace it
//! 2. `clientTempId` of a pending placeholder: retire the placeholder
//! 3. content heuristic, only for outbound echoes without `clientTempId` and
//!    only when exactly one placeholder qualifies
//! 4. insert, unless it duplicates a recent outbound message with the same text
//!
//! Applying the same message twice leaves the store unchanged.

use chrono::Duration;
use std::cmp::Ordering;
use tracing::debug;

use super::optimistic::OptimisticBuffer;
use crate::model::{Message, is_temp_id};
use crate::store::{MessageStore, UpsertOutcome};

#[derive(Debug, Clone, Copy)]
pub struct MergeSettings {
    /// Max distance between a placeholder's creation and an echo's timestamp
    /// for the content heuristic.
    pub match_window: Duration,
    /// Identical outbound messages closer than this are treated as one.
    pub duplicate_window: Duration,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            match_window: Duration::seconds(30),
            duplicate_window: Duration::seconds(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Replaced,
    Unchanged,
    /// A placeholder was retired in favor of this message.
    Reconciled {
        client_temp_id: String,
        heuristic: bool,
    },
    /// Dropped as a duplicate of `kept_id`.
    Suppressed { kept_id: String },
    /// Belongs to another conversation or is not an authoritative row.
    Ignored,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub replaced: usize,
    pub reconciled: Vec<String>,
    pub suppressed: usize,
    pub ignored: usize,
    /// Placeholders evicted as stale after this merge.
    pub evicted: Vec<String>,
    /// Authoritative entries purged by a full-page replace.
    pub purged: usize,
}

impl MergeReport {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Replaced => self.replaced += 1,
            MergeOutcome::Unchanged => {}
            MergeOutcome::Reconciled { client_temp_id, .. } => {
                self.reconciled.push(client_temp_id);
            }
            MergeOutcome::Suppressed { .. } => self.suppressed += 1,
            MergeOutcome::Ignored => self.ignored += 1,
        }
    }

    /// Whether the visible transcript may have changed.
    pub fn changed(&self) -> bool {
        self.inserted > 0
            || self.replaced > 0
            || !self.reconciled.is_empty()
            || !self.evicted.is_empty()
            || self.purged > 0
    }
}

/// Merge one authoritative message into `store` for `conversation_id`.
pub fn merge_message(
    store: &mut MessageStore,
    buffer: &mut OptimisticBuffer,
    settings: &MergeSettings,
    conversation_id: &str,
    message: Message,
) -> MergeOutcome {
    if message.conversation_id != conversation_id {
        debug!(
            "ignoring message {} for conversation {}",
            message.id, message.conversation_id
        );
        return MergeOutcome::Ignored;
    }
    if is_temp_id(&message.id) {
        debug!("ignoring non-authoritative row {}", message.id);
        return MergeOutcome::Ignored;
    }

    // 1. known id
    if store.contains(&message.id) {
        let retired = retire_placeholder(store, buffer, message.client_temp_id.as_deref());
        let outcome = store.upsert(message);
        return match (retired, outcome) {
            (Some(client_temp_id), _) => MergeOutcome::Reconciled {
                client_temp_id,
                heuristic: false,
            },
            (None, UpsertOutcome::Unchanged) => MergeOutcome::Unchanged,
            (None, _) => MergeOutcome::Replaced,
        };
    }

    // 2. correlation id
    if let Some(temp_id) = message.client_temp_id.clone() {
        if let Some(existing) = store.find_authoritative_by_client_temp_id(&temp_id) {
            // at most one authoritative row per clientTempId
            let existing_id = existing.id.clone();
            return keep_lowest_id(store, existing_id, message);
        }
        if let Some(client_temp_id) = retire_placeholder(store, buffer, Some(&temp_id)) {
            debug!("reconciled {} with {}", client_temp_id, message.id);
            store.upsert(message);
            return MergeOutcome::Reconciled {
                client_temp_id,
                heuristic: false,
            };
        }
    }

    // 3. content heuristic
    if message.is_outbound() && message.client_temp_id.is_none() {
        let candidates = buffer.heuristic_candidates(
            &message.content_text,
            message.timestamp,
            settings.match_window,
        );
        match candidates.as_slice() {
            [single] => {
                let client_temp_id = (*single).to_string();
                buffer.remove(&client_temp_id);
                store.remove_optimistic(&client_temp_id);
                debug!(
                    "heuristically matched {} to {}",
                    client_temp_id, message.id
                );
                store.upsert(message);
                return MergeOutcome::Reconciled {
                    client_temp_id,
                    heuristic: true,
                };
            }
            [] => {}
            several => {
                debug!(
                    "{} placeholders match {}; leaving them for eviction",
                    several.len(),
                    message.id
                );
            }
        }
    }

    // 4. duplicate suppression
    if let Some(existing_id) = find_duplicate(store, settings, &message) {
        return keep_lowest_id(store, existing_id, message);
    }

    store.upsert(message);
    MergeOutcome::Inserted
}

/// Merge a batch (poll page or event burst) in order.
pub fn merge_batch(
    store: &mut MessageStore,
    buffer: &mut OptimisticBuffer,
    settings: &MergeSettings,
    conversation_id: &str,
    messages: Vec<Message>,
) -> MergeReport {
    let mut report = MergeReport::default();
    for message in messages {
        report.record(merge_message(
            store,
            buffer,
            settings,
            conversation_id,
            message,
        ));
    }
    report
}

/// Apply a full page with replace semantics: purge what the page no longer
/// contains inside its time range, then run the page through the matcher so
/// placeholders are retired exactly as for a poll.
pub fn merge_replace(
    store: &mut MessageStore,
    buffer: &mut OptimisticBuffer,
    settings: &MergeSettings,
    conversation_id: &str,
    page: Vec<Message>,
) -> MergeReport {
    let own: Vec<Message> = page
        .into_iter()
        .filter(|m| m.conversation_id == conversation_id)
        .collect();
    let purged = store.purge_missing(&own);
    let mut report = merge_batch(store, buffer, settings, conversation_id, own);
    report.purged = purged.len();
    report
}

/// Order of backend ids: numeric when both parse, lexicographic otherwise.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn retire_placeholder(
    store: &mut MessageStore,
    buffer: &mut OptimisticBuffer,
    client_temp_id: Option<&str>,
) -> Option<String> {
    let temp_id = client_temp_id?;
    let from_buffer = buffer.remove(temp_id).is_some();
    let from_store = store.remove_optimistic(temp_id).is_some();
    (from_buffer || from_store).then(|| temp_id.to_string())
}

fn find_duplicate(
    store: &MessageStore,
    settings: &MergeSettings,
    message: &Message,
) -> Option<String> {
    if !message.is_outbound() || message.content_text.is_empty() {
        return None;
    }
    store
        .iter()
        .find(|m| {
            m.is_outbound()
                && !m.is_optimistic()
                && m.id != message.id
                && m.content_text == message.content_text
                && (m.timestamp - message.timestamp).abs() < settings.duplicate_window
        })
        .map(|m| m.id.clone())
}

fn keep_lowest_id(store: &mut MessageStore, existing_id: String, message: Message) -> MergeOutcome {
    if compare_ids(&existing_id, &message.id) == Ordering::Greater {
        debug!("duplicate {} superseded by {}", existing_id, message.id);
        store.remove(&existing_id);
        let kept_id = message.id.clone();
        store.upsert(message);
        MergeOutcome::Suppressed { kept_id }
    } else {
        debug!("suppressing duplicate {} of {}", message.id, existing_id);
        MergeOutcome::Suppressed {
            kept_id: existing_id,
        }
    }
}

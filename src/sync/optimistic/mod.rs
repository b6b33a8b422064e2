//! Locally created placeholders awaiting confirmation from the backend.

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;

use crate::model::OutgoingContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    /// The send call has not returned yet.
    InFlight,
    /// The backend accepted the send; the echo has not been merged yet.
    Accepted { at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct PendingSend {
    pub client_temp_id: String,
    pub content: OutgoingContent,
    /// Text the heuristic matcher compares against echoes.
    pub preview_text: String,
    pub created_at: DateTime<Utc>,
    pub state: SendState,
}

impl PendingSend {
    pub fn is_in_flight(&self) -> bool {
        self.state == SendState::InFlight
    }
}

/// Pending sends keyed by `clientTempId`, in creation order.
#[derive(Debug, Default)]
pub struct OptimisticBuffer {
    entries: IndexMap<String, PendingSend>,
}

impl OptimisticBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn insert(&mut self, client_temp_id: &str, content: OutgoingContent, now: DateTime<Utc>) {
        let preview_text = content.preview_text();
        self.entries.insert(
            client_temp_id.to_string(),
            PendingSend {
                client_temp_id: client_temp_id.to_string(),
                content,
                preview_text,
                created_at: now,
                state: SendState::InFlight,
            },
        );
    }

    pub fn get(&self, client_temp_id: &str) -> Option<&PendingSend> {
        self.entries.get(client_temp_id)
    }

    pub fn contains(&self, client_temp_id: &str) -> bool {
        self.entries.contains_key(client_temp_id)
    }

    /// Record that the send call returned successfully.
    pub fn mark_accepted(&mut self, client_temp_id: &str, at: DateTime<Utc>) -> bool {
        match self.entries.get_mut(client_temp_id) {
            Some(entry) => {
                entry.state = SendState::Accepted { at };
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, client_temp_id: &str) -> Option<PendingSend> {
        self.entries.shift_remove(client_temp_id)
    }

    /// Pending sends an echo without `clientTempId` could belong to: same
    /// non-empty text, created within `window` of the echo's timestamp.
    pub fn heuristic_candidates(
        &self,
        text: &str,
        timestamp: DateTime<Utc>,
        window: Duration,
    ) -> Vec<&str> {
        if text.is_empty() {
            return Vec::new();
        }
        self.entries
            .values()
            .filter(|p| p.preview_text == text)
            .filter(|p| (p.created_at - timestamp).abs() < window)
            .map(|p| p.client_temp_id.as_str())
            .collect()
    }

    /// Drop entries older than `stale_after` whose send settled before
    /// `poll_requested_at`: a page fetched after the backend accepted them came
    /// back without their echo. In-flight sends are never evicted.
    pub fn evict_stale(
        &mut self,
        now: DateTime<Utc>,
        stale_after: Duration,
        poll_requested_at: DateTime<Utc>,
    ) -> Vec<PendingSend> {
        let stale: Vec<String> = self
            .entries
            .values()
            .filter(|p| now - p.created_at > stale_after)
            .filter(|p| match p.state {
                SendState::InFlight => false,
                SendState::Accepted { at } => at <= poll_requested_at,
            })
            .map(|p| p.client_temp_id.clone())
            .collect();
        stale.iter().filter_map(|id| self.remove(id)).collect()
    }
}

//! Ordered, deduplicated message collection for the active conversation.
//!
//! Entries are kept sorted by `(timestamp, insertion order)`. A separate visible
//! index excludes reaction/status rows and rows the viewer deleted for
//! themselves; it is rebuilt after every mutation so readers only ever see the
//! filtered, sorted view.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::model::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Identical copy already present.
    Unchanged,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    message: Message,
}

#[derive(Debug, Default)]
pub struct MessageStore {
    viewer: Option<String>,
    entries: Vec<Entry>,
    visible: Vec<usize>,
    next_seq: u64,
}

impl MessageStore {
    pub fn new(viewer: Option<String>) -> Self {
        Self {
            viewer,
            ..Self::default()
        }
    }

    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.visible.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.position(id).map(|i| &self.entries[i].message)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Every stored message in order, hidden rows included.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    /// The externally visible, ordered view.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.visible.iter().map(|&i| &self.entries[i].message)
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    /// Insert `message`, or replace the entry with the same id in place.
    ///
    /// A replacement keeps the original insertion order, so an update only moves
    /// the message when its timestamp changed.
    pub fn upsert(&mut self, message: Message) -> UpsertOutcome {
        let outcome = match self.position(&message.id) {
            Some(i) if self.entries[i].message == message => return UpsertOutcome::Unchanged,
            Some(i) => {
                self.entries[i].message = message;
                UpsertOutcome::Replaced
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.push(Entry { seq, message });
                UpsertOutcome::Inserted
            }
        };
        self.reindex();
        outcome
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let i = self.position(id)?;
        let entry = self.entries.remove(i);
        self.reindex();
        Some(entry.message)
    }

    /// Remove the pending placeholder created under `client_temp_id`.
    pub fn remove_optimistic(&mut self, client_temp_id: &str) -> Option<Message> {
        let i = self.entries.iter().position(|e| {
            e.message.is_optimistic()
                && e.message.client_temp_id.as_deref() == Some(client_temp_id)
        })?;
        let entry = self.entries.remove(i);
        self.reindex();
        Some(entry.message)
    }

    /// Authoritative message carrying `client_temp_id`, if one was stored.
    pub fn find_authoritative_by_client_temp_id(&self, client_temp_id: &str) -> Option<&Message> {
        self.iter().find(|m| {
            !m.is_optimistic() && m.client_temp_id.as_deref() == Some(client_temp_id)
        })
    }

    /// Bulk replace with a full page from the backend.
    ///
    /// Authoritative entries whose timestamp falls inside the page's range but
    /// that the page no longer contains are purged; older history and optimistic
    /// entries survive. Returns the purged messages.
    pub fn replace(&mut self, page: Vec<Message>) -> Vec<Message> {
        let purged = self.purge_missing(&page);
        for message in page {
            match self.position(&message.id) {
                Some(i) => self.entries[i].message = message,
                None => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    self.entries.push(Entry { seq, message });
                }
            }
        }
        self.reindex();
        purged
    }

    /// The purge half of [`replace`](Self::replace), for callers that insert
    /// the page themselves.
    pub fn purge_missing(&mut self, page: &[Message]) -> Vec<Message> {
        let Some((from, to)) = time_range(page) else {
            return Vec::new();
        };
        let keep: HashSet<&str> = page.iter().map(|m| m.id.as_str()).collect();
        let (purged, kept): (Vec<Entry>, Vec<Entry>) =
            self.entries.drain(..).partition(|entry| {
                let m = &entry.message;
                m.timestamp >= from
                    && m.timestamp <= to
                    && !m.is_optimistic()
                    && !keep.contains(m.id.as_str())
            });
        self.entries = kept;
        if !purged.is_empty() {
            self.reindex();
        }
        purged.into_iter().map(|e| e.message).collect()
    }

    pub fn latest_inbound_at(&self) -> Option<DateTime<Utc>> {
        self.iter()
            .filter(|m| !m.is_outbound() && !m.message_type.is_hidden())
            .map(|m| m.timestamp)
            .max()
    }

    /// Most recent template the backend confirmed as sent.
    pub fn latest_template_sent_at(&self) -> Option<DateTime<Utc>> {
        self.iter()
            .filter(|m| m.is_outbound() && m.is_template() && !m.is_optimistic())
            .map(|m| m.timestamp)
            .max()
    }

    /// Cursor for history backfill.
    pub fn oldest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.iter()
            .filter(|m| !m.is_optimistic())
            .map(|m| m.timestamp)
            .min()
    }

    pub fn optimistic_ids(&self) -> Vec<String> {
        self.iter()
            .filter(|m| m.is_optimistic())
            .map(|m| m.id.clone())
            .collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.message.id == id)
    }

    fn reindex(&mut self) {
        self.entries
            .sort_by(|a, b| (a.message.timestamp, a.seq).cmp(&(b.message.timestamp, b.seq)));
        let viewer = self.viewer.as_deref();
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.message.is_hidden_for(viewer))
            .map(|(i, _)| i)
            .collect();
    }
}

fn time_range(page: &[Message]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let from = page.iter().map(|m| m.timestamp).min()?;
    let to = page.iter().map(|m| m.timestamp).max()?;
    Some((from, to))
}

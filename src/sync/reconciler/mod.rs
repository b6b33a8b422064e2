//! The single state container behind the engine.
//!
//! Owns the message store, the optimistic buffer, the window tracker, the draft
//! and the reaction index for the active conversation. Every mutation goes
//! through a method here, and every method that applies remote data takes the
//! [`Activation`] it was requested under so late responses for a previous
//! conversation (or a previous opening of the same one) are rejected.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::merger::{self, MergeReport, MergeSettings};
use super::optimistic::OptimisticBuffer;
use crate::errors::{InboxError, InboxResult};
use crate::model::{Conversation, Message, OutgoingContent, Reaction, new_client_temp_id};
use crate::store::MessageStore;
use crate::window::{TemplateMode, WindowEffect, WindowEvent, WindowTracker};

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub merge: MergeSettings,
    /// Age after which an unconfirmed placeholder may be evicted.
    pub stale_after: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            merge: MergeSettings::default(),
            stale_after: Duration::seconds(45),
        }
    }
}

/// Identifies one opening of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub conversation_id: String,
    pub generation: u64,
}

/// Result of applying remote data.
#[derive(Debug, Default)]
pub struct Applied {
    pub report: MergeReport,
    pub effects: Vec<WindowEffect>,
}

/// Handle for a send that has been placed optimistically.
#[derive(Debug, Clone)]
pub struct PendingTicket {
    pub activation: Activation,
    pub client_temp_id: String,
    pub content: OutgoingContent,
}

#[derive(Debug)]
pub struct Reconciler {
    settings: SyncSettings,
    viewer: Option<String>,
    active: Option<Activation>,
    generation: u64,
    conversation: Option<Conversation>,
    store: MessageStore,
    buffer: OptimisticBuffer,
    window: WindowTracker,
    draft: Option<OutgoingContent>,
    reactions: HashMap<String, Vec<Reaction>>,
}

impl Reconciler {
    pub fn new(settings: SyncSettings, viewer: Option<String>, preference: TemplateMode) -> Self {
        Self {
            settings,
            store: MessageStore::new(viewer.clone()),
            viewer,
            active: None,
            generation: 0,
            conversation: None,
            buffer: OptimisticBuffer::new(),
            window: WindowTracker::new(preference),
            draft: None,
            reactions: HashMap::new(),
        }
    }

    pub fn viewer(&self) -> Option<&str> {
        self.viewer.as_deref()
    }

    pub fn active(&self) -> Option<&Activation> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn buffer(&self) -> &OptimisticBuffer {
        &self.buffer
    }

    pub fn window(&self) -> &WindowTracker {
        &self.window
    }

    pub fn visible_messages(&self) -> Vec<Message> {
        self.store.visible().cloned().collect()
    }

    /// Make `conversation_id` the active conversation, discarding all state
    /// that belonged to the previous one.
    pub fn activate(&mut self, conversation_id: &str) -> (Activation, Vec<WindowEffect>) {
        self.generation += 1;
        let activation = Activation {
            conversation_id: conversation_id.to_string(),
            generation: self.generation,
        };
        self.reset_conversation_state();
        self.active = Some(activation.clone());
        info!(
            "activated conversation {} (generation {})",
            conversation_id, self.generation
        );
        let effects = self.window.apply(WindowEvent::ConversationSwitched);
        (activation, effects)
    }

    pub fn deactivate(&mut self) {
        if let Some(prev) = self.active.take() {
            info!("closed conversation {}", prev.conversation_id);
        }
        self.reset_conversation_state();
        self.window.apply(WindowEvent::ConversationSwitched);
    }

    /// Conversation metadata, once fetched.
    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn set_conversation(
        &mut self,
        activation: &Activation,
        conversation: Conversation,
    ) -> InboxResult<()> {
        self.ensure_current(activation)?;
        self.conversation = Some(conversation);
        Ok(())
    }

    pub fn is_current(&self, activation: &Activation) -> bool {
        self.active.as_ref() == Some(activation)
    }

    pub fn ensure_current(&self, activation: &Activation) -> InboxResult<()> {
        if self.is_current(activation) {
            return Ok(());
        }
        let expected = self
            .active
            .as_ref()
            .map_or_else(|| "<none>".to_string(), |a| a.conversation_id.clone());
        Err(InboxError::StaleConversation {
            expected,
            actual: activation.conversation_id.clone(),
        })
    }

    /// Realtime events or any other augmenting batch.
    pub fn apply_batch(
        &mut self,
        activation: &Activation,
        messages: Vec<Message>,
    ) -> InboxResult<Applied> {
        self.ensure_current(activation)?;
        let report = merger::merge_batch(
            &mut self.store,
            &mut self.buffer,
            &self.settings.merge,
            &activation.conversation_id,
            messages,
        );
        Ok(self.finish(report))
    }

    /// A poll page. Placeholders still unmatched afterwards are evicted when
    /// stale and settled before the poll was requested.
    pub fn apply_poll(
        &mut self,
        activation: &Activation,
        page: Vec<Message>,
        requested_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> InboxResult<Applied> {
        self.ensure_current(activation)?;
        let mut report = merger::merge_batch(
            &mut self.store,
            &mut self.buffer,
            &self.settings.merge,
            &activation.conversation_id,
            page,
        );
        for pending in self
            .buffer
            .evict_stale(now, self.settings.stale_after, requested_at)
        {
            warn!(
                "evicting unconfirmed message {} after {}s",
                pending.client_temp_id,
                (now - pending.created_at).num_seconds()
            );
            self.store.remove_optimistic(&pending.client_temp_id);
            report.evicted.push(pending.client_temp_id);
        }
        Ok(self.finish(report))
    }

    /// A newest page fetched as a forced refresh: replace semantics.
    pub fn apply_refresh(
        &mut self,
        activation: &Activation,
        page: Vec<Message>,
    ) -> InboxResult<Applied> {
        self.ensure_current(activation)?;
        let report = merger::merge_replace(
            &mut self.store,
            &mut self.buffer,
            &self.settings.merge,
            &activation.conversation_id,
            page,
        );
        Ok(self.finish(report))
    }

    /// Place `content` optimistically and clear the draft.
    pub fn begin_send(
        &mut self,
        content: OutgoingContent,
        now: DateTime<Utc>,
    ) -> InboxResult<PendingTicket> {
        let activation = self.active.clone().ok_or_else(|| InboxError::Validation {
            message: "no active conversation".to_string(),
            code: None,
            details: None,
        })?;
        if content.is_empty() {
            return Err(InboxError::Validation {
                message: "message is empty".to_string(),
                code: None,
                details: None,
            });
        }
        let client_temp_id = new_client_temp_id();
        let placeholder = Message::optimistic(
            &activation.conversation_id,
            &client_temp_id,
            &content,
            self.viewer.as_deref(),
            now,
        );
        self.store.upsert(placeholder);
        self.buffer.insert(&client_temp_id, content.clone(), now);
        self.draft = None;
        debug!("placed optimistic message {}", client_temp_id);
        Ok(PendingTicket {
            activation,
            client_temp_id,
            content,
        })
    }

    /// The send call succeeded; the placeholder now waits for its echo.
    pub fn settle_send(&mut self, ticket: &PendingTicket, now: DateTime<Utc>) {
        if self.is_current(&ticket.activation) {
            self.buffer.mark_accepted(&ticket.client_temp_id, now);
        }
    }

    /// The send call failed: drop the placeholder and hand the content back to
    /// the compose area. Returns `true` if the draft was restored.
    pub fn rollback_send(&mut self, ticket: &PendingTicket) -> bool {
        if !self.is_current(&ticket.activation) {
            return false;
        }
        self.buffer.remove(&ticket.client_temp_id);
        self.store.remove_optimistic(&ticket.client_temp_id);
        self.draft = Some(ticket.content.clone());
        warn!("rolled back message {}", ticket.client_temp_id);
        true
    }

    pub fn draft(&self) -> Option<&OutgoingContent> {
        self.draft.as_ref()
    }

    pub fn set_draft(&mut self, draft: Option<OutgoingContent>) {
        self.draft = draft;
    }

    pub fn take_draft(&mut self) -> Option<OutgoingContent> {
        self.draft.take()
    }

    /// Content to resend for a failed message offering retry.
    pub fn retry_content(&self, message_id: &str) -> InboxResult<OutgoingContent> {
        let message = self.store.get(message_id).ok_or_else(|| InboxError::Validation {
            message: format!("unknown message {message_id}"),
            code: None,
            details: None,
        })?;
        if !message.can_retry() {
            return Err(InboxError::Validation {
                message: format!("message {message_id} cannot be retried"),
                code: None,
                details: None,
            });
        }
        message.to_outgoing().ok_or_else(|| InboxError::Validation {
            message: format!("message {message_id} has no resendable content"),
            code: None,
            details: None,
        })
    }

    pub fn apply_window(&mut self, event: WindowEvent) -> Vec<WindowEffect> {
        self.window.apply(event)
    }

    pub fn set_reactions(
        &mut self,
        activation: &Activation,
        message_id: &str,
        reactions: Vec<Reaction>,
    ) -> InboxResult<()> {
        self.ensure_current(activation)?;
        if reactions.is_empty() {
            self.reactions.remove(message_id);
        } else {
            self.reactions.insert(message_id.to_string(), reactions);
        }
        Ok(())
    }

    pub fn reactions(&self, message_id: &str) -> &[Reaction] {
        self.reactions.get(message_id).map_or(&[], Vec::as_slice)
    }

    fn finish(&mut self, report: MergeReport) -> Applied {
        let effects = self.window.apply(WindowEvent::HistoryObserved {
            last_inbound_at: self.store.latest_inbound_at(),
            last_template_sent_at: self.store.latest_template_sent_at(),
        });
        if report.changed() {
            debug!(
                "merge: +{} ~{} reconciled={} evicted={} purged={}",
                report.inserted,
                report.replaced,
                report.reconciled.len(),
                report.evicted.len(),
                report.purged
            );
        }
        Applied { report, effects }
    }

    fn reset_conversation_state(&mut self) {
        self.conversation = None;
        self.store.clear();
        self.buffer.clear();
        self.reactions.clear();
        self.draft = None;
    }
}

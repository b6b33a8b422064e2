//! Send coordination: optimistic placement, dispatch, settle or roll back.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{Engine, EngineEvent, TEMPLATE_REFRESH_TASK, no_active_conversation};
use crate::api::dispatch_send;
use crate::errors::{InboxError, InboxResult, SendFailure};
use crate::model::{MessageTemplate, OutgoingContent};
use crate::sync::{Activation, PendingTicket};
use crate::window::WindowEvent;

impl Engine {
    /// Send `content` to the active conversation. The placeholder appears
    /// immediately; on success its `clientTempId` is returned and the echo
    /// replaces it later. On failure the placeholder is removed, the content is
    /// restored as the draft, and the newest page is reloaded.
    pub async fn send(&self, content: OutgoingContent) -> Result<String, SendFailure> {
        let ticket = {
            let mut state = self.shared.state.lock().await;
            state
                .begin_send(content.clone(), Utc::now())
                .map_err(|error| SendFailure {
                    client_temp_id: None,
                    draft: content,
                    error,
                })?
        };
        self.emit(EngineEvent::MessagesChanged);

        let result = dispatch_send(
            self.shared.api.as_ref(),
            &ticket.activation.conversation_id,
            &ticket.client_temp_id,
            &ticket.content,
        )
        .await;

        match result {
            Ok(()) => {
                self.on_sent(&ticket).await;
                Ok(ticket.client_temp_id)
            }
            Err(error) => Err(self.on_send_failed(ticket, error).await),
        }
    }

    /// Send the current draft.
    pub async fn send_draft(&self) -> InboxResult<String> {
        let draft = self
            .shared
            .state
            .lock()
            .await
            .draft()
            .cloned()
            .ok_or_else(|| InboxError::Validation {
                message: "nothing to send".to_string(),
                code: None,
                details: None,
            })?;
        Ok(self.send(draft).await?)
    }

    pub async fn send_text(&self, text: &str) -> Result<String, SendFailure> {
        self.send(OutgoingContent::Text(text.to_string())).await
    }

    /// Send `template` with `params` filling its placeholders in component order.
    pub async fn send_template(
        &self,
        template: &MessageTemplate,
        params: &[String],
    ) -> Result<String, SendFailure> {
        self.send(OutgoingContent::Template(template.to_send(params)))
            .await
    }

    /// Resend the content of a failed message under a fresh `clientTempId`.
    pub async fn retry(&self, message_id: &str) -> InboxResult<String> {
        let content = {
            let state = self.shared.state.lock().await;
            if state.active().is_none() {
                return Err(no_active_conversation());
            }
            state.retry_content(message_id)?
        };
        info!("retrying message {}", message_id);
        Ok(self.send(content).await?)
    }

    async fn on_sent(&self, ticket: &PendingTicket) {
        let now = Utc::now();
        let effects = {
            let mut state = self.shared.state.lock().await;
            state.settle_send(ticket, now);
            if ticket.content.is_template() && state.is_current(&ticket.activation) {
                state.apply_window(WindowEvent::TemplateSent { at: now })
            } else {
                Vec::new()
            }
        };
        debug!("message {} accepted", ticket.client_temp_id);
        if ticket.content.is_template() {
            self.run_effects(&ticket.activation, effects).await;
            self.schedule_template_refresh(&ticket.activation).await;
        }
    }

    async fn on_send_failed(&self, ticket: PendingTicket, error: InboxError) -> SendFailure {
        warn!("send of {} failed: {}", ticket.client_temp_id, error);
        let restored = self.shared.state.lock().await.rollback_send(&ticket);
        if restored {
            self.emit(EngineEvent::MessagesChanged);
            self.emit(EngineEvent::DraftRestored(ticket.content.clone()));
            // the backend may have stored the message before failing
            match self.refresh_for(&ticket.activation).await {
                Ok(()) | Err(InboxError::StaleConversation { .. }) => {}
                Err(e) => warn!("refresh after failed send: {}", e),
            }
        }
        SendFailure {
            client_temp_id: Some(ticket.client_temp_id),
            draft: ticket.content,
            error,
        }
    }

    /// The template echo can lag the send call; reload the newest page shortly
    /// after. A later template send replaces a pending refresh.
    async fn schedule_template_refresh(&self, activation: &Activation) {
        let engine = self.clone();
        let activation = activation.clone();
        let delay = self.shared.settings.template_refresh_delay;
        self.shared
            .tasks
            .spawn(TEMPLATE_REFRESH_TASK, async move {
                tokio::time::sleep(delay).await;
                match engine.refresh_for(&activation).await {
                    Ok(()) | Err(InboxError::StaleConversation { .. }) => {}
                    Err(e) => warn!("template refresh failed: {}", e),
                }
            })
            .await;
    }
}

//! Consumer of realtime insert/update events for the active conversation.

use tracing::{debug, error, warn};

use super::{Engine, EngineEvent, REALTIME_TASK};
use crate::bus::{RealtimeEvent, Subscription};
use crate::errors::{InboxError, InboxResult};
use crate::model::Message;
use crate::notify::Notification;
use crate::sync::Activation;

impl Engine {
    /// Subscribe before spawning so no event published after `open` returns can
    /// be missed.
    pub(super) async fn start_realtime(&self, activation: &Activation) {
        let subscription = self
            .shared
            .realtime
            .subscribe(&activation.conversation_id);
        let engine = self.clone();
        let activation = activation.clone();
        self.shared
            .tasks
            .spawn(REALTIME_TASK, async move {
                engine.consume(activation, subscription).await;
            })
            .await;
    }

    async fn consume(&self, activation: Activation, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            match self.handle_event(&activation, event).await {
                Ok(()) => {}
                Err(InboxError::StaleConversation { .. }) => {
                    debug!("realtime consumer for {} superseded", activation.conversation_id);
                    return;
                }
                Err(e) => error!(
                    "realtime event for {} failed: {}",
                    activation.conversation_id, e
                ),
            }
        }
        debug!("realtime source closed for {}", activation.conversation_id);
    }

    /// Apply one realtime event under `activation`.
    pub(super) async fn handle_event(
        &self,
        activation: &Activation,
        event: RealtimeEvent,
    ) -> InboxResult<()> {
        if event.conversation_id() != activation.conversation_id {
            warn!(
                "ignoring {} event for {} while {} is active",
                event.kind(),
                event.conversation_id(),
                activation.conversation_id
            );
            return Ok(());
        }

        match event {
            RealtimeEvent::MessageInserted(message) => {
                let candidate = message.clone();
                let applied = self
                    .shared
                    .state
                    .lock()
                    .await
                    .apply_batch(activation, vec![message])?;
                let inserted = applied.report.inserted > 0;
                self.after_apply(activation, applied).await;
                if inserted {
                    self.maybe_notify(&candidate).await;
                }
            }
            RealtimeEvent::MessageUpdated(message) => {
                let applied = self
                    .shared
                    .state
                    .lock()
                    .await
                    .apply_batch(activation, vec![message])?;
                self.after_apply(activation, applied).await;
            }
            RealtimeEvent::ReactionChanged {
                conversation_id,
                message_id,
            } => {
                let reactions = self
                    .shared
                    .api
                    .get_reactions(&conversation_id, &message_id)
                    .await?;
                self.shared.state.lock().await.set_reactions(
                    activation,
                    &message_id,
                    reactions,
                )?;
                self.emit(EngineEvent::ReactionsChanged { message_id });
            }
        }
        Ok(())
    }

    async fn maybe_notify(&self, message: &Message) {
        if self.is_focused() {
            return;
        }
        let (viewer, account_id, title) = {
            let state = self.shared.state.lock().await;
            let conversation = state.conversation();
            (
                state.viewer().map(str::to_string),
                conversation.map(|c| c.account_id.clone()),
                conversation.map_or_else(
                    || message.conversation_id.clone(),
                    |c| c.title().to_string(),
                ),
            )
        };
        if message.authored_by(viewer.as_deref()) {
            return;
        }
        if !self.shared.settings.notifications.allows(account_id.as_deref()) {
            debug!("notifications muted for account {:?}", account_id);
            return;
        }
        let notification = Notification::for_message(message, account_id.as_deref(), &title);
        if let Err(e) = self.shared.notifier.notify(&notification).await {
            warn!("notification for {} failed: {}", message.id, e);
        }
    }
}

//! Eligibility (free-form vs. template) and template list lookups.

use tracing::debug;

use super::{ELIGIBILITY_TASK, Engine, EngineEvent};
use crate::errors::InboxResult;
use crate::sync::Activation;
use crate::window::{WindowEffect, WindowEvent};

impl Engine {
    /// Ask the backend whether a free-form message is currently allowed.
    pub async fn check_eligibility(&self) -> InboxResult<()> {
        let activation = self.current_activation().await?;
        let effects = self.fetch_eligibility(&activation).await;
        self.run_effects(&activation, effects).await;
        Ok(())
    }

    /// Compose input changed. Rechecks eligibility once typing settles; each
    /// call restarts the delay.
    pub async fn on_compose_input(&self) {
        let Some(activation) = self.shared.state.lock().await.active().cloned() else {
            return;
        };
        let engine = self.clone();
        let delay = self.shared.settings.eligibility_debounce;
        self.shared
            .tasks
            .spawn(ELIGIBILITY_TASK, async move {
                tokio::time::sleep(delay).await;
                let effects = engine.fetch_eligibility(&activation).await;
                engine.run_effects(&activation, effects).await;
            })
            .await;
    }

    /// Failures resolve as free-form allowed.
    pub(super) async fn fetch_eligibility(&self, activation: &Activation) -> Vec<WindowEffect> {
        let result = self
            .shared
            .api
            .get_message_price(&activation.conversation_id)
            .await;
        let mut state = self.shared.state.lock().await;
        if !state.is_current(activation) {
            debug!("dropping eligibility for {}", activation.conversation_id);
            return Vec::new();
        }
        match result {
            Ok(price) => {
                debug!(
                    "eligibility for {}: free={}",
                    activation.conversation_id, price.is_free
                );
                state.apply_window(WindowEvent::EligibilityResolved(price))
            }
            Err(e) => state.apply_window(WindowEvent::EligibilityFailed(format!(
                "{}: {}",
                activation.conversation_id, e
            ))),
        }
    }

    pub(super) async fn fetch_templates(&self, activation: &Activation) -> Vec<WindowEffect> {
        let result = self
            .shared
            .api
            .get_available_templates(&activation.conversation_id)
            .await;
        let effects = {
            let mut state = self.shared.state.lock().await;
            if !state.is_current(activation) {
                debug!("dropping templates for {}", activation.conversation_id);
                return Vec::new();
            }
            match result {
                Ok(templates) => {
                    debug!(
                        "loaded {} templates for {}",
                        templates.len(),
                        activation.conversation_id
                    );
                    state.apply_window(WindowEvent::TemplatesLoaded(templates))
                }
                Err(e) => state.apply_window(WindowEvent::TemplatesFailed(format!(
                    "{}: {}",
                    activation.conversation_id, e
                ))),
            }
        };
        self.emit(EngineEvent::TemplatesChanged);
        effects
    }
}

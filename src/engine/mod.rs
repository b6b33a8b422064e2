//! The conversation sync engine.
//!
//! [`Engine`] wires the [`Reconciler`] to the backend: it runs the poller and
//! the realtime consumer for the active conversation, coordinates sends, and
//! carries out the window tracker's effects. All state lives behind one mutex
//! that is never held across a network call; every response is applied under
//! the [`Activation`] it was requested for, so responses that resolve after a
//! conversation switch are dropped.

mod eligibility;
mod poller;
mod realtime;
mod send;

use chrono::Duration as ChronoDuration;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::InboxApi;
use crate::bus::RealtimeSource;
use crate::config::Config;
use crate::errors::{InboxError, InboxResult};
use crate::model::{Conversation, Message, MessageTemplate, OutgoingContent, Reaction};
use crate::notify::{NotificationPolicy, Notifier};
use crate::sync::{Activation, Applied, MergeSettings, Reconciler, SyncSettings};
use crate::utils::task_tracker::TaskTracker;
use crate::window::{TemplateMode, WindowEffect, WindowEvent, WindowMode, WindowSnapshot};

const EVENT_CAPACITY: usize = 256;

const POLLER_TASK: &str = "poller";
const REALTIME_TASK: &str = "realtime";
const ELIGIBILITY_TASK: &str = "eligibility";
const TEMPLATE_REFRESH_TASK: &str = "template-refresh";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub sync: SyncSettings,
    pub poll_interval: Duration,
    pub page_limit: u32,
    pub template_refresh_delay: Duration,
    pub eligibility_debounce: Duration,
    pub template_mode: TemplateMode,
    pub viewer: Option<String>,
    pub notifications: NotificationPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sync: SyncSettings::default(),
            poll_interval: Duration::from_secs(3),
            page_limit: 50,
            template_refresh_delay: Duration::from_millis(400),
            eligibility_debounce: Duration::from_millis(500),
            template_mode: TemplateMode::Manual,
            viewer: None,
            notifications: NotificationPolicy::new(true, Vec::new()),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let sync = &config.sync;
        Self {
            sync: SyncSettings {
                merge: MergeSettings {
                    match_window: secs(sync.optimistic_match_window_secs),
                    duplicate_window: secs(sync.duplicate_window_secs),
                },
                stale_after: secs(sync.optimistic_stale_after_secs),
            },
            poll_interval: Duration::from_millis(sync.poll_interval_ms),
            page_limit: config.api.page_limit,
            template_refresh_delay: Duration::from_millis(sync.template_refresh_delay_ms),
            eligibility_debounce: Duration::from_millis(sync.eligibility_debounce_ms),
            template_mode: config.window.template_mode,
            viewer: config.viewer.user_id.clone(),
            notifications: NotificationPolicy::new(
                config.notifications.enabled,
                config.notifications.muted_accounts.iter().cloned(),
            ),
        }
    }
}

fn no_active_conversation() -> InboxError {
    InboxError::Validation {
        message: "no active conversation".to_string(),
        code: None,
        details: None,
    }
}

fn secs(value: u64) -> ChronoDuration {
    ChronoDuration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

/// Change notifications for observers of the engine (CLI, UI).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The visible transcript changed.
    MessagesChanged,
    WindowChanged(WindowMode),
    TemplatesChanged,
    ReactionsChanged { message_id: String },
    /// A failed send handed its content back to the compose area.
    DraftRestored(OutgoingContent),
}

struct Shared {
    api: Arc<dyn InboxApi>,
    realtime: Arc<dyn RealtimeSource>,
    notifier: Arc<dyn Notifier>,
    settings: EngineSettings,
    state: Mutex<Reconciler>,
    tasks: TaskTracker,
    focused: watch::Sender<bool>,
    /// Generation of the activation whose poll is in flight, 0 when idle.
    poll_in_flight: AtomicU64,
    events: broadcast::Sender<EngineEvent>,
}

/// Cheaply cloneable handle to one engine instance.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(
        api: Arc<dyn InboxApi>,
        realtime: Arc<dyn RealtimeSource>,
        notifier: Arc<dyn Notifier>,
        settings: EngineSettings,
    ) -> Self {
        let reconciler = Reconciler::new(
            settings.sync,
            settings.viewer.clone(),
            settings.template_mode,
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (focused, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                api,
                realtime,
                notifier,
                settings,
                state: Mutex::new(reconciler),
                tasks: TaskTracker::new(),
                focused,
                poll_in_flight: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Open `conversation_id` as the active conversation: tear down the previous
    /// poller and subscription, subscribe, load the newest page, check
    /// eligibility, and start polling.
    pub async fn open(&self, conversation_id: &str) -> InboxResult<()> {
        self.shared.tasks.cancel_all().await;
        let (activation, effects) = self.shared.state.lock().await.activate(conversation_id);
        self.emit(EngineEvent::MessagesChanged);

        match self.shared.api.get_conversation(conversation_id).await {
            Ok(conversation) => {
                self.shared
                    .state
                    .lock()
                    .await
                    .set_conversation(&activation, conversation)?;
            }
            Err(e) => warn!("could not load conversation {}: {}", conversation_id, e),
        }

        // subscribe before the first fetch so no insert falls between the two
        self.start_realtime(&activation).await;
        match self.refresh_for(&activation).await {
            Ok(()) => {}
            Err(e @ InboxError::StaleConversation { .. }) => return Err(e),
            // the poller retries on its next tick
            Err(e) => warn!("first page load failed for {}: {}", conversation_id, e),
        }

        let mut effects = effects;
        effects.push(WindowEffect::RecheckEligibility);
        self.run_effects(&activation, effects).await;

        self.start_poller(&activation).await;
        info!("opened conversation {}", conversation_id);
        Ok(())
    }

    /// Stop all background work and forget the active conversation.
    pub async fn close(&self) {
        self.shared.tasks.cancel_all().await;
        self.shared.state.lock().await.deactivate();
        self.emit(EngineEvent::MessagesChanged);
    }

    /// Whether the conversation view is focused. Polling pauses while it is
    /// not, and new messages raise notifications instead.
    pub fn set_focused(&self, focused: bool) {
        let previous = self.shared.focused.send_replace(focused);
        if previous != focused {
            debug!("focus changed: {}", focused);
        }
    }

    pub fn is_focused(&self) -> bool {
        *self.shared.focused.borrow()
    }

    pub async fn active_conversation(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .await
            .active()
            .map(|a| a.conversation_id.clone())
    }

    pub async fn conversation(&self) -> Option<Conversation> {
        self.shared.state.lock().await.conversation().cloned()
    }

    /// The visible transcript, oldest first.
    pub async fn visible_messages(&self) -> Vec<Message> {
        self.shared.state.lock().await.visible_messages()
    }

    pub async fn window(&self) -> WindowSnapshot {
        self.shared.state.lock().await.window().snapshot()
    }

    pub async fn templates(&self) -> Vec<MessageTemplate> {
        self.shared
            .state
            .lock()
            .await
            .window()
            .templates()
            .map(<[MessageTemplate]>::to_vec)
            .unwrap_or_default()
    }

    pub async fn reactions(&self, message_id: &str) -> Vec<Reaction> {
        self.shared.state.lock().await.reactions(message_id).to_vec()
    }

    pub async fn draft(&self) -> Option<OutgoingContent> {
        self.shared.state.lock().await.draft().cloned()
    }

    pub async fn set_draft(&self, draft: Option<OutgoingContent>) {
        self.shared.state.lock().await.set_draft(draft);
    }

    pub async fn set_template_mode(&self, mode: TemplateMode) -> InboxResult<()> {
        self.apply_window_event(WindowEvent::PreferenceChanged(mode))
            .await
    }

    /// Force the template selector even though a template is awaiting reply.
    pub async fn reactivate_templates(&self) -> InboxResult<()> {
        self.apply_window_event(WindowEvent::ReactivateRequested)
            .await
    }

    async fn apply_window_event(&self, event: WindowEvent) -> InboxResult<()> {
        let activation = self.current_activation().await?;
        let effects = self.shared.state.lock().await.apply_window(event);
        self.run_effects(&activation, effects).await;
        Ok(())
    }

    async fn current_activation(&self) -> InboxResult<Activation> {
        self.shared
            .state
            .lock()
            .await
            .active()
            .cloned()
            .ok_or_else(no_active_conversation)
    }

    /// Emit change events and carry out window effects for applied remote data.
    async fn after_apply(&self, activation: &Activation, applied: Applied) {
        if applied.report.changed() {
            self.emit(EngineEvent::MessagesChanged);
        }
        self.run_effects(activation, applied.effects).await;
    }

    /// Carry out window effects until none are left. Eligibility and template
    /// responses can only yield template fetches and mode changes, so the queue
    /// drains.
    async fn run_effects(&self, activation: &Activation, effects: Vec<WindowEffect>) {
        let mut queue: VecDeque<WindowEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                WindowEffect::RecheckEligibility => {
                    queue.extend(self.fetch_eligibility(activation).await);
                }
                WindowEffect::FetchTemplates => {
                    queue.extend(self.fetch_templates(activation).await);
                }
                WindowEffect::ModeChanged { from, to } => {
                    info!("messaging window {} -> {}", from, to);
                    self.emit(EngineEvent::WindowChanged(to));
                }
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        // no subscribers is fine
        let _ = self.shared.events.send(event);
    }
}

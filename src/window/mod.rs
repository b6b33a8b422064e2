//! Customer-service window state machine.
//!
//! [`compute_mode`] is the only place a [`WindowMode`] is derived. The
//! [`WindowTracker`] owns the inputs, applies one [`WindowEvent`] at a time and
//! answers with the [`WindowEffect`]s the engine has to carry out (eligibility
//! re-checks, template fetches). It performs no I/O.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::model::{MessageTemplate, PriceInfo};

/// Length of the platform's free customer-service window.
pub const SERVICE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowMode {
    Free,
    AutoTemplate,
    ManualWaitingReply,
    ManualSelectingTemplate,
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Free => "FREE",
            Self::AutoTemplate => "AUTO_TEMPLATE",
            Self::ManualWaitingReply => "MANUAL_WAITING_REPLY",
            Self::ManualSelectingTemplate => "MANUAL_SELECTING_TEMPLATE",
        })
    }
}

/// Operator preference for sending outside the free window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
    /// The backend upgrades every send to an eligible template.
    Auto,
    /// The operator picks a template.
    #[default]
    Manual,
}

/// Eligibility as last reported by `getMessagePrice`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Eligibility {
    #[default]
    Unknown,
    Known(PriceInfo),
    /// The check failed; treated as free.
    Failed,
}

impl Eligibility {
    /// Unknown and failed lookups fail open.
    pub fn is_free(&self) -> bool {
        match self {
            Self::Known(price) => price.is_free,
            Self::Unknown | Self::Failed => true,
        }
    }
}

/// Pure mode derivation.
///
/// `reactivated` is the operator's "reactivate template mode" override; it only
/// matters where [`WindowMode::ManualWaitingReply`] would otherwise apply.
pub fn compute_mode(
    is_free: bool,
    preference: TemplateMode,
    last_inbound_at: Option<DateTime<Utc>>,
    last_template_sent_at: Option<DateTime<Utc>>,
    reactivated: bool,
) -> WindowMode {
    if is_free {
        return WindowMode::Free;
    }
    if preference == TemplateMode::Auto {
        return WindowMode::AutoTemplate;
    }
    let awaiting_reply = match (last_template_sent_at, last_inbound_at) {
        (Some(template), Some(inbound)) => template > inbound,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if awaiting_reply && !reactivated {
        WindowMode::ManualWaitingReply
    } else {
        WindowMode::ManualSelectingTemplate
    }
}

#[derive(Debug, Clone)]
pub enum WindowEvent {
    EligibilityResolved(PriceInfo),
    EligibilityFailed(String),
    PreferenceChanged(TemplateMode),
    /// Latest timestamps derived from the message store after a merge.
    HistoryObserved {
        last_inbound_at: Option<DateTime<Utc>>,
        last_template_sent_at: Option<DateTime<Utc>>,
    },
    /// A template send call succeeded.
    TemplateSent { at: DateTime<Utc> },
    ReactivateRequested,
    TemplatesLoaded(Vec<MessageTemplate>),
    TemplatesFailed(String),
    ConversationSwitched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEffect {
    RecheckEligibility,
    FetchTemplates,
    ModeChanged { from: WindowMode, to: WindowMode },
}

/// Read-only view for callers outside the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub mode: WindowMode,
    pub eligibility: Eligibility,
    pub preference: TemplateMode,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub last_template_sent_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reactivated: bool,
    pub templates: Option<Vec<MessageTemplate>>,
}

#[derive(Debug, Clone)]
pub struct WindowTracker {
    eligibility: Eligibility,
    preference: TemplateMode,
    last_inbound_at: Option<DateTime<Utc>>,
    last_template_sent_at: Option<DateTime<Utc>>,
    reactivated: bool,
    templates: Option<Vec<MessageTemplate>>,
    templates_requested: bool,
    mode: WindowMode,
}

impl WindowTracker {
    pub fn new(preference: TemplateMode) -> Self {
        let mut tracker = Self {
            eligibility: Eligibility::Unknown,
            preference,
            last_inbound_at: None,
            last_template_sent_at: None,
            reactivated: false,
            templates: None,
            templates_requested: false,
            mode: WindowMode::Free,
        };
        tracker.mode = tracker.derive_mode();
        tracker
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn is_free(&self) -> bool {
        self.eligibility.is_free()
    }

    pub fn preference(&self) -> TemplateMode {
        self.preference
    }

    pub fn templates(&self) -> Option<&[MessageTemplate]> {
        self.templates.as_deref()
    }

    /// End of the free window opened by the last customer message. Informational
    /// only; eligibility comes from the backend.
    pub fn window_expires_at(&self) -> Option<DateTime<Utc>> {
        self.last_inbound_at
            .map(|at| at + Duration::hours(SERVICE_WINDOW_HOURS))
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            mode: self.mode,
            eligibility: self.eligibility,
            preference: self.preference,
            last_inbound_at: self.last_inbound_at,
            last_template_sent_at: self.last_template_sent_at,
            expires_at: self.window_expires_at(),
            reactivated: self.reactivated,
            templates: self.templates.clone(),
        }
    }

    /// Apply one input and return what the engine must do next.
    pub fn apply(&mut self, event: WindowEvent) -> Vec<WindowEffect> {
        let mut effects = Vec::new();
        match event {
            WindowEvent::EligibilityResolved(price) => {
                self.eligibility = Eligibility::Known(price);
            }
            WindowEvent::EligibilityFailed(reason) => {
                warn!("eligibility check failed, allowing free-form sends: {}", reason);
                self.eligibility = Eligibility::Failed;
            }
            WindowEvent::PreferenceChanged(preference) => {
                self.preference = preference;
            }
            WindowEvent::HistoryObserved {
                last_inbound_at,
                last_template_sent_at,
            } => {
                let new_inbound = match (last_inbound_at, self.last_inbound_at) {
                    (Some(new), Some(old)) => new > old,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                self.last_inbound_at = last_inbound_at.max(self.last_inbound_at);
                self.last_template_sent_at = last_template_sent_at.max(self.last_template_sent_at);
                // a customer message may have reopened the window
                if new_inbound && !self.is_free() {
                    effects.push(WindowEffect::RecheckEligibility);
                }
            }
            WindowEvent::TemplateSent { at } => {
                self.last_template_sent_at = Some(at).max(self.last_template_sent_at);
                self.reactivated = false;
                effects.push(WindowEffect::RecheckEligibility);
            }
            WindowEvent::ReactivateRequested => {
                self.reactivated = true;
            }
            WindowEvent::TemplatesLoaded(templates) => {
                self.templates_requested = false;
                if self.is_free() {
                    debug!("dropping template list received while free");
                } else {
                    self.templates = Some(templates);
                }
            }
            WindowEvent::TemplatesFailed(reason) => {
                warn!("failed to load templates: {}", reason);
                self.templates_requested = false;
            }
            WindowEvent::ConversationSwitched => {
                let previous = self.mode;
                *self = Self::new(self.preference);
                self.mode = previous;
            }
        }
        self.settle(&mut effects);
        effects
    }

    fn derive_mode(&self) -> WindowMode {
        compute_mode(
            self.eligibility.is_free(),
            self.preference,
            self.last_inbound_at,
            self.last_template_sent_at,
            self.reactivated,
        )
    }

    fn settle(&mut self, effects: &mut Vec<WindowEffect>) {
        let next = self.derive_mode();
        if next == WindowMode::Free && self.templates.take().is_some() {
            debug!("window is free, cleared cached templates");
        }
        if next == WindowMode::ManualSelectingTemplate
            && self.templates.is_none()
            && !self.templates_requested
        {
            self.templates_requested = true;
            effects.push(WindowEffect::FetchTemplates);
        }
        if next != self.mode {
            debug!("window mode {} -> {}", self.mode, next);
            effects.push(WindowEffect::ModeChanged {
                from: self.mode,
                to: next,
            });
            self.mode = next;
        }
    }
}

//! Realtime message bus.
//!
//! The push channel is modelled as a typed event stream: payloads from the
//! webhook gateway (or any other source) are parsed into [`RealtimeEvent`]s and
//! fanned out by the [`RealtimeHub`] to subscriptions keyed by conversation id.

pub mod events;
pub mod hub;
pub mod table;

pub use events::{ChangeKind, RealtimeEvent, RealtimePayload, ReactionRow};
pub use hub::{RealtimeHub, RealtimeSource, Subscription};
pub use table::RealtimeTable;

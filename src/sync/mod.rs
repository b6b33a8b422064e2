//! Optimistic sends and reconciliation of authoritative messages.

pub mod merger;
pub mod optimistic;
pub mod reconciler;

pub use merger::{MergeOutcome, MergeReport, MergeSettings};
pub use optimistic::{OptimisticBuffer, PendingSend, SendState};
pub use reconciler::{Activation, Applied, PendingTicket, Reconciler, SyncSettings};

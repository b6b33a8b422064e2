#![warn(clippy::pedantic)]
// Noisy doc/signature lints
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
// Prices and page sizes cross integer/float boundaries
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod bus;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod model;
pub mod notify;
pub mod store;
pub mod sync;
pub(crate) mod utils;
pub mod window;

/// Re-exports for fuzz targets. Not part of the public API.
#[doc(hidden)]
pub mod fuzz_api {
    /// Wrapper around `gateway::validate_webhook_signature` for fuzz targets.
    pub fn validate_webhook_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
        crate::gateway::validate_webhook_signature(secret, signature, body)
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

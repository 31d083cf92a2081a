//! Registre Core - Common infrastructure for business-registry document pullers
//!
//! This crate provides the reusable pieces shared by the registry clients:
//! the authenticated, rate-limited and retrying HTTP client, the pagination
//! driver, document filtering and SIREN input handling.

pub mod classify;
pub mod client;
pub mod error;
pub mod filter;
pub mod http;
pub mod logging;
pub mod paginate;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod siren;
pub mod stats;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod token_store;

// Re-exports for convenience
pub use client::{AuthClient, AuthScheme, Call, LoginConfig, TrafficClass};
pub use error::{CallError, ConfigError, QuotaStop};
pub use filter::{AllowList, Document, MatchMode, normalize};
pub use http::{ApiRequest, ApiResponse, HttpConfig, HttpTransport, Transport, TransportError};
pub use logging::{IndicatifLogger, init_logging};
pub use paginate::{PageShape, Pages, decode_page};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use rate_limit::RateLimiter;
pub use retry::{Disposition, QuotaPolicy, RetryPolicy, Sleep, ThreadSleep};
pub use shutdown::{install_signal_handlers, is_shutdown_requested, request_shutdown};
pub use siren::{is_valid_siren, load_sirens};
pub use sink::write_atomic;
pub use stats::{ItemOutcome, RunOutcome, RunStats};
pub use token_store::TokenStore;

//! Cohort Core - shared infrastructure for the matching pipeline
//!
//! Logging, progress reporting, retry policy, refresh policy and the
//! blocking HTTP bridge used by the provider adapters.

pub mod http;
pub mod logging;
pub mod progress;
pub mod refresh;
pub mod retry;

// Re-exports for convenience
pub use http::{SHARED_RUNTIME, http_client};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, fmt_num};
pub use refresh::Refresh;
pub use retry::{Retryable, RetryPolicy};

//! Error types for the server lifecycle.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the lifecycle manager and the runner.
///
/// Every failure is returned to the immediate caller; the crate performs no
/// internal retries or backoff. Retry policy, if wanted, belongs to the
/// caller. A repeated `stop` is deliberately *not* an error.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listening on the configured address failed. Fatal; not retried.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The configured network kind is not supported by this transport.
    #[error("unsupported network kind {0:?} (only \"tcp\" is supported)")]
    UnsupportedNetwork(String),

    /// Extracting the externally reachable address failed. Fatal.
    #[error("endpoint resolution failed: {0}")]
    Endpoint(String),

    /// An operation was invoked in a state that does not permit it,
    /// e.g. `start` after `stop` or a second concurrent `start`.
    #[error("lifecycle violation: {0}")]
    Lifecycle(&'static str),

    /// Graceful stop exceeded an externally imposed deadline.
    #[error("graceful stop did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    /// The dispatch runtime failed while serving.
    #[error("transport failure: {0}")]
    Transport(#[from] tonic::transport::Error),
}

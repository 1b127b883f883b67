//! Transport service contracts.
//!
//! The two capabilities a lifecycle-managed transport exposes to its
//! callers. Both are object-safe so a runner can drive a heterogeneous set
//! of services through `Arc<dyn Service>`.

use async_trait::async_trait;
use url::Url;

use crate::error::ServerError;

/// A long-running transport service with a uniform start/stop contract.
#[async_trait]
pub trait Service: Send + Sync {
    /// Serve until stopped or a fatal transport error. Blocks for the
    /// lifetime of the serve loop.
    async fn start(&self) -> Result<(), ServerError>;

    /// Gracefully stop: reject new work, drain in-flight work, release
    /// resources. Idempotent.
    async fn stop(&self) -> Result<(), ServerError>;
}

/// Endpoint discovery, valid before or after the service started.
#[async_trait]
pub trait EndPointer: Send + Sync {
    /// The externally reachable endpoint, resolved lazily on first use and
    /// identical on every subsequent call.
    async fn endpoint(&self) -> Result<Url, ServerError>;
}

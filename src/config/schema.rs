//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files and
//! carry defaults so a minimal (or empty) file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for an application built on this crate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// gRPC server settings.
    pub server: ServerConfig,

    /// Runner settings (shutdown behavior).
    pub runner: RunnerConfig,
}

/// gRPC server configuration.
///
/// Only fields that affect binding and serving live here; capabilities that
/// cannot come from a file (interceptors, pre-bound listeners, cleanup
/// hooks) are configured on [`GrpcServerBuilder`](crate::GrpcServerBuilder).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Network kind. Only the "tcp" family is supported; anything else is
    /// rejected at bind time, not at load time.
    pub network: String,

    /// Bind address (e.g., ":0", "127.0.0.1:9000"). An empty host binds the
    /// wildcard address; port 0 asks the OS for an ephemeral port.
    pub address: String,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Whether to register the gRPC health service.
    pub health_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: "tcp".to_string(),
            address: ":0".to_string(),
            request_timeout_ms: 1_000,
            health_enabled: true,
        }
    }
}

impl ServerConfig {
    /// The configured request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RunnerConfig {
    /// Deadline for each service's graceful stop, in milliseconds.
    /// Unset means wait indefinitely for in-flight work to drain.
    pub stop_timeout_ms: Option<u64>,
}

impl RunnerConfig {
    /// The configured stop deadline as a [`Duration`], if any.
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.network, "tcp");
        assert_eq!(config.address, ":0");
        assert_eq!(config.request_timeout(), Duration::from_millis(1_000));
        assert!(config.health_enabled);
        assert_eq!(RunnerConfig::default().stop_timeout(), None);
    }

    #[test]
    fn test_minimal_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.address, ":0");

        let config: AppConfig = toml::from_str(
            r#"
            [server]
            address = "127.0.0.1:9000"
            health_enabled = false

            [runner]
            stop_timeout_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert!(!config.server.health_enabled);
        // untouched fields keep their defaults
        assert_eq!(config.server.network, "tcp");
        assert_eq!(config.runner.stop_timeout(), Some(Duration::from_secs(5)));
    }
}

//! Health coordination.
//!
//! # State Transitions
//! ```text
//! NotServing → Serving:      after bind, before the accept loop starts
//! Serving    → ShuttingDown: on stop, before the runtime begins draining
//! ShuttingDown is terminal
//! ```
//!
//! The coordinator always tracks state in-process. When health is enabled
//! at construction it additionally owns a `tonic-health` reporter and
//! mirrors transitions onto the server-wide service name (the empty string,
//! per the gRPC health protocol), so external probes fail fast during
//! shutdown instead of racing new connections against teardown. Disabled
//! configurations have no externally observable signal.

use std::sync::Mutex;

use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::HealthReporter;
use tonic_health::ServingStatus;

/// Server-wide service name of the gRPC health protocol.
const SERVER_WIDE: &str = "";

/// Readiness of the managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    NotServing,
    Serving,
    ShuttingDown,
}

/// Tracks readiness and mirrors it onto the wire health service if enabled.
pub struct HealthCoordinator {
    state: Mutex<HealthState>,
    reporter: Option<HealthReporter>,
}

impl HealthCoordinator {
    /// Coordinator with no wire-visible health service.
    pub(crate) fn disabled() -> Self {
        Self {
            state: Mutex::new(HealthState::NotServing),
            reporter: None,
        }
    }

    /// Coordinator plus the health service to register with the runtime.
    pub(crate) fn enabled() -> (Self, HealthServer<impl Health>) {
        let (reporter, service) = tonic_health::server::health_reporter();
        let coordinator = Self {
            state: Mutex::new(HealthState::NotServing),
            reporter: Some(reporter),
        };
        (coordinator, service)
    }

    /// Current in-process readiness.
    pub fn state(&self) -> HealthState {
        *self.state.lock().unwrap()
    }

    /// Whether a wire health service was registered.
    pub fn is_enabled(&self) -> bool {
        self.reporter.is_some()
    }

    /// Flip to Serving. A no-op unless currently NotServing, so a server
    /// already shutting down can never flip back.
    pub(crate) async fn mark_serving(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if *state != HealthState::NotServing {
                return;
            }
            *state = HealthState::Serving;
        }

        if let Some(reporter) = &self.reporter {
            let mut reporter = reporter.clone();
            reporter
                .set_service_status(SERVER_WIDE, ServingStatus::Serving)
                .await;
        }
        tracing::debug!("Health marked serving");
    }

    /// Flip to ShuttingDown (terminal) and report NotServing on the wire.
    pub(crate) async fn mark_shutting_down(&self) {
        *self.state.lock().unwrap() = HealthState::ShuttingDown;

        if let Some(reporter) = &self.reporter {
            let mut reporter = reporter.clone();
            reporter
                .set_service_status(SERVER_WIDE, ServingStatus::NotServing)
                .await;
        }
        tracing::debug!("Health marked shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transitions() {
        let (coordinator, _service) = HealthCoordinator::enabled();
        assert!(coordinator.is_enabled());
        assert_eq!(coordinator.state(), HealthState::NotServing);

        coordinator.mark_serving().await;
        assert_eq!(coordinator.state(), HealthState::Serving);

        coordinator.mark_shutting_down().await;
        assert_eq!(coordinator.state(), HealthState::ShuttingDown);

        // terminal: serving again is refused
        coordinator.mark_serving().await;
        assert_eq!(coordinator.state(), HealthState::ShuttingDown);
    }

    #[tokio::test]
    async fn test_disabled_is_passthrough() {
        let coordinator = HealthCoordinator::disabled();
        assert!(!coordinator.is_enabled());

        coordinator.mark_serving().await;
        assert_eq!(coordinator.state(), HealthState::Serving);
    }
}

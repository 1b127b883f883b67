//! Application runner.
//!
//! # Responsibilities
//! - Start every registered service on its own task
//! - Wait for a shutdown trigger, Ctrl+C, or the first service to exit
//! - Stop services in reverse registration order, each under the optional
//!   stop deadline
//!
//! # Design Decisions
//! - Reverse-order stop mirrors registration-order start, so dependents go
//!   down before their dependencies
//! - A stop overrunning its deadline maps to `ShutdownTimeout`; the runner
//!   then abandons that service's task rather than waiting forever

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time;

use crate::config::RunnerConfig;
use crate::error::ServerError;
use crate::lifecycle::Shutdown;
use crate::transport::Service;

/// Drives a set of [`Service`] instances through a shared lifecycle.
pub struct Runner {
    services: Vec<Arc<dyn Service>>,
    shutdown: Shutdown,
    stop_timeout: Option<Duration>,
}

impl Runner {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            shutdown: Shutdown::new(),
            stop_timeout: None,
        }
    }

    /// Seed runner settings from a loaded configuration.
    pub fn from_config(config: &RunnerConfig) -> Self {
        let mut runner = Self::new();
        runner.stop_timeout = config.stop_timeout();
        runner
    }

    /// Deadline applied to each service's graceful stop.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Register a service. Services start in registration order and stop in
    /// reverse order.
    pub fn register(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// A handle that triggers shutdown programmatically.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until shutdown, then stop everything.
    ///
    /// Returns the first error observed: an early service exit, a failed
    /// stop, or a stop that overran its deadline (`ShutdownTimeout`).
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut tasks = JoinSet::new();
        for (index, service) in self.services.iter().enumerate() {
            let service = service.clone();
            tasks.spawn(async move { (index, service.start().await) });
        }

        tracing::info!(services = self.services.len(), "Runner started");

        let mut first_error = None;
        let mut signal = self.shutdown.subscribe();
        tokio::select! {
            _ = signal.recv() => {
                tracing::info!("Shutdown signal received");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received");
            }
            Some(joined) = tasks.join_next(), if !self.services.is_empty() => {
                if let Ok((index, result)) = joined {
                    match result {
                        Ok(()) => tracing::warn!(service = index, "Service exited early"),
                        Err(e) => {
                            tracing::error!(service = index, error = %e, "Service failed");
                            first_error = Some(e);
                        }
                    }
                }
            }
        }

        for (index, service) in self.services.iter().enumerate().rev() {
            let stopped = match self.stop_timeout {
                Some(deadline) => match time::timeout(deadline, service.stop()).await {
                    Ok(result) => result,
                    Err(_) => Err(ServerError::ShutdownTimeout(deadline)),
                },
                None => service.stop().await,
            };
            if let Err(e) = stopped {
                tracing::error!(service = index, error = %e, "Service stop failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        // anything still running overran its stop; don't wait forever
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, Err(e))) = joined {
                tracing::warn!(service = index, error = %e, "Service start returned error");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        tracing::info!("Runner stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

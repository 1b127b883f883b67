//! Server construction.
//!
//! # Design Decisions
//! - Explicit named setters instead of option closures: setters apply in
//!   call order, scalar fields are last-write-wins, interceptor chains are
//!   wholesale-replaced, services and runtime tweaks append
//! - Nothing is validated here; invalid combinations surface at bind time
//! - `build()` consumes the builder, so binding configuration is frozen
//!   before the server can be observed

use std::sync::Arc;
use std::time::Duration;

use http::{Request, Response};
use tokio::net::TcpListener;
use tonic::body::BoxBody;
use tonic::server::NamedService;
use tonic::service::Routes;
use tonic::transport::Server as TonicServer;

use crate::config::ServerConfig;
use crate::grpc::health::HealthCoordinator;
use crate::grpc::interceptor::InterceptorFn;
use crate::grpc::server::{CleanupFn, GrpcServer, RuntimeTweak};
use crate::net::ListenerHandle;

/// Configures and builds a [`GrpcServer`].
pub struct GrpcServerBuilder {
    config: ServerConfig,
    listener: Option<Arc<TcpListener>>,
    unary_interceptors: Vec<InterceptorFn>,
    stream_interceptors: Vec<InterceptorFn>,
    span: Option<tracing::Span>,
    cleanup: Option<CleanupFn>,
    tweaks: Vec<RuntimeTweak>,
    routes: Routes,
}

impl GrpcServerBuilder {
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Seed the scalar fields from a loaded configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            listener: None,
            unary_interceptors: Vec::new(),
            stream_interceptors: Vec::new(),
            span: None,
            cleanup: None,
            tweaks: Vec::new(),
            routes: Routes::default(),
        }
    }

    /// Override the network kind (default "tcp", the only supported family).
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.config.network = network.into();
        self
    }

    /// Override the bind address (default ":0").
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Override the per-request timeout (default 1s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Supply a pre-bound listener. The configured network and address
    /// become advisory (only consulted for wildcard substitution), and
    /// ownership of the socket stays with the caller: the server drops its
    /// `Arc` clone on stop without closing the caller's.
    pub fn listener(mut self, listener: Arc<TcpListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replace the unary interceptor chain.
    pub fn unary_interceptors(mut self, chain: Vec<InterceptorFn>) -> Self {
        self.unary_interceptors = chain;
        self
    }

    /// Replace the stream interceptor chain.
    pub fn stream_interceptors(mut self, chain: Vec<InterceptorFn>) -> Self {
        self.stream_interceptors = chain;
        self
    }

    /// Toggle registration of the gRPC health service (default on).
    pub fn health(mut self, enabled: bool) -> Self {
        self.config.health_enabled = enabled;
        self
    }

    /// Run lifecycle logging under this span instead of a fresh one.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Hook run exactly once at the start of `stop`, before the health flip
    /// and the runtime drain.
    pub fn on_cleanup<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup = Some(Box::new(hook));
        self
    }

    /// Opaque pass-through to the tonic server builder, applied at start
    /// time in registration order, before the interceptor layer.
    pub fn runtime_option<F>(mut self, tweak: F) -> Self
    where
        F: FnOnce(TonicServer) -> TonicServer + Send + 'static,
    {
        self.tweaks.push(Box::new(tweak));
        self
    }

    /// Register a gRPC service with the dispatch runtime.
    pub fn add_service<S>(mut self, svc: S) -> Self
    where
        S: tower::Service<
                Request<BoxBody>,
                Response = Response<BoxBody>,
                Error = std::convert::Infallible,
            > + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.routes = self.routes.add_service(svc);
        self
    }

    /// Assemble the server. Binding configuration is frozen from here on.
    pub fn build(self) -> GrpcServer {
        let (health, routes) = if self.config.health_enabled {
            let (coordinator, service) = HealthCoordinator::enabled();
            (coordinator, self.routes.add_service(service))
        } else {
            (HealthCoordinator::disabled(), self.routes)
        };

        let span = self
            .span
            .unwrap_or_else(|| tracing::info_span!("grpc_server"));

        GrpcServer::assemble(
            self.config,
            self.listener.map(ListenerHandle::Shared),
            self.unary_interceptors,
            self.stream_interceptors,
            health,
            self.cleanup,
            self.tweaks,
            routes,
            span,
        )
    }
}

impl Default for GrpcServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::health::HealthState;

    #[test]
    fn test_scalar_setters_are_last_write_wins() {
        let server = GrpcServerBuilder::new()
            .address("127.0.0.1:9000")
            .timeout(Duration::from_secs(5))
            .address("127.0.0.1:9001")
            .build();
        assert_eq!(server.config().address, "127.0.0.1:9001");
        assert_eq!(server.config().request_timeout(), Duration::from_secs(5));
        assert_eq!(server.lifecycle(), crate::lifecycle::Lifecycle::Constructed);
        assert_eq!(server.health_state(), HealthState::NotServing);
    }

    #[test]
    fn test_health_toggle() {
        let server = GrpcServerBuilder::new().health(false).build();
        assert_eq!(server.health_state(), HealthState::NotServing);
    }

    #[tokio::test]
    async fn test_invalid_combinations_surface_at_bind_time() {
        // setting a bogus network is accepted here...
        let server = GrpcServerBuilder::new().network("carrier-pigeon").build();
        // ...and only rejected when resolution actually binds
        let err = server.endpoint().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServerError::UnsupportedNetwork(_)
        ));
    }
}

//! gRPC server lifecycle management.
//!
//! # Responsibilities
//! - Resolve the listener and endpoint lazily, exactly once, from either
//!   `start` or `endpoint`
//! - Flip health state around the serve loop in a fixed order
//! - Run the tonic serve loop with graceful shutdown
//! - Coordinate `stop`: cleanup hook → health flip → drain → listener close
//!
//! # Design Decisions
//! - Resolution is memoized in a `OnceCell`: concurrent first callers share
//!   a single bind, and a failed attempt caches nothing
//! - A second concurrent `start` fails fast instead of blocking
//! - `stop` is idempotent and blocks until the runtime finished draining

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::OnceCell;
use tonic::service::Routes;
use tonic::transport::Server as TonicServer;
use tracing::Instrument;
use url::Url;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::grpc::builder::GrpcServerBuilder;
use crate::grpc::endpoint;
use crate::grpc::health::{HealthCoordinator, HealthState};
use crate::grpc::interceptor::{self, InterceptorFn};
use crate::lifecycle::{Lifecycle, Shutdown, StateCell};
use crate::net::ListenerHandle;
use crate::transport::{EndPointer, Service};

/// Hook run exactly once at the start of `stop`, before the health flip and
/// before the runtime begins draining.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// Opaque pass-through applied to the tonic server builder at start time.
pub type RuntimeTweak = Box<dyn FnOnce(TonicServer) -> TonicServer + Send>;

/// Lifecycle manager for a tonic gRPC server.
///
/// Construct through [`GrpcServer::builder`]. The manager owns the listener
/// handle, the memoized endpoint, the health coordinator, and the runtime
/// configuration; it exposes exactly the [`Service`] and [`EndPointer`]
/// contracts. Restart is not supported: once stopped, a server stays
/// stopped.
pub struct GrpcServer {
    config: ServerConfig,
    endpoint: OnceCell<Url>,
    listener: tokio::sync::Mutex<Option<ListenerHandle>>,
    routes: Mutex<Option<Routes>>,
    tweaks: Mutex<Vec<RuntimeTweak>>,
    cleanup: Mutex<Option<CleanupFn>>,
    unary_interceptors: Vec<InterceptorFn>,
    stream_interceptors: Vec<InterceptorFn>,
    health: HealthCoordinator,
    state: StateCell,
    shutdown: Shutdown,
    start_gate: AtomicBool,
    span: tracing::Span,
}

impl GrpcServer {
    /// Start configuring a new server.
    pub fn builder() -> GrpcServerBuilder {
        GrpcServerBuilder::new()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        config: ServerConfig,
        listener: Option<ListenerHandle>,
        unary_interceptors: Vec<InterceptorFn>,
        stream_interceptors: Vec<InterceptorFn>,
        health: HealthCoordinator,
        cleanup: Option<CleanupFn>,
        tweaks: Vec<RuntimeTweak>,
        routes: Routes,
        span: tracing::Span,
    ) -> Self {
        Self {
            config,
            endpoint: OnceCell::new(),
            listener: tokio::sync::Mutex::new(listener),
            routes: Mutex::new(Some(routes)),
            tweaks: Mutex::new(tweaks),
            cleanup: Mutex::new(cleanup),
            unary_interceptors,
            stream_interceptors,
            health,
            state: StateCell::new(),
            shutdown: Shutdown::new(),
            start_gate: AtomicBool::new(false),
            span,
        }
    }

    /// The frozen configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.current()
    }

    /// Current in-process health state.
    pub fn health_state(&self) -> HealthState {
        self.health.state()
    }

    /// Serve until stopped. Blocks for the lifetime of the serve loop and
    /// returns `Ok(())` after a graceful stop.
    ///
    /// At most one `start` may be in flight per server: a second call while
    /// one is running (or after the server began serving) fails fast with
    /// [`ServerError::Lifecycle`], as does any `start` after `stop`.
    pub async fn start(&self) -> Result<(), ServerError> {
        self.run_serve().instrument(self.span.clone()).await
    }

    /// Gracefully stop: run the cleanup hook, flip health to shutting-down,
    /// then drain in-flight requests before returning. Idempotent: calling
    /// it again (or before any `start`) is a no-op returning `Ok(())`.
    ///
    /// No deadline is applied here; a caller that needs one races this
    /// future against a timer and escalates on expiry.
    pub async fn stop(&self) -> Result<(), ServerError> {
        self.run_stop().instrument(self.span.clone()).await
    }

    /// The externally reachable endpoint, resolving (and binding) lazily on
    /// first use. Subsequent calls return the memoized value without
    /// re-binding, from any lifecycle state.
    pub async fn endpoint(&self) -> Result<Url, ServerError> {
        self.resolve_endpoint().instrument(self.span.clone()).await
    }

    async fn run_serve(&self) -> Result<(), ServerError> {
        if matches!(
            self.state.current(),
            Lifecycle::Stopping | Lifecycle::Stopped
        ) {
            return Err(ServerError::Lifecycle("cannot start a stopped server"));
        }
        if self.start_gate.swap(true, Ordering::SeqCst) {
            return Err(ServerError::Lifecycle("start already in flight"));
        }

        let resolved = match self.resolve_endpoint().await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.start_gate.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let listener = self.listener.lock().await.take();
        let Some(listener) = listener else {
            // stop() won the race and already released the listener
            self.start_gate.store(false, Ordering::SeqCst);
            return Err(ServerError::Lifecycle("server was stopped before serving began"));
        };
        let owned = listener.is_owned();
        let incoming = listener.into_incoming();

        let routes = self.routes.lock().unwrap().take().unwrap_or_default();
        let tweaks = mem::take(&mut *self.tweaks.lock().unwrap());

        let mut runtime = TonicServer::builder().timeout(self.config.request_timeout());
        for tweak in tweaks {
            runtime = tweak(runtime);
        }
        let composed =
            interceptor::compose(&self.unary_interceptors, &self.stream_interceptors);
        let mut runtime = runtime.layer(tonic::service::interceptor(composed));
        let router = runtime.add_routes(routes);

        // subscribe before publishing Serving so a concurrent stop() cannot
        // trigger the signal ahead of our subscription
        let mut signal = self.shutdown.subscribe();

        self.health.mark_serving().await;
        if self
            .state
            .advance_if(&[Lifecycle::Resolving], Lifecycle::Serving)
            .is_err()
        {
            self.health.mark_shutting_down().await;
            return Err(ServerError::Lifecycle("server was stopped before serving began"));
        }

        tracing::info!(endpoint = %resolved, owned_listener = owned, "gRPC server serving");

        let served = router
            .serve_with_incoming_shutdown(incoming, async move {
                let _ = signal.recv().await;
            })
            .await;

        self.state.set(Lifecycle::Stopped);
        match served {
            Ok(()) => {
                tracing::info!("gRPC server stopped");
                Ok(())
            }
            Err(e) => {
                self.health.mark_shutting_down().await;
                tracing::error!(error = %e, "gRPC server failed");
                Err(ServerError::Transport(e))
            }
        }
    }

    async fn run_stop(&self) -> Result<(), ServerError> {
        loop {
            if self
                .state
                .advance_if(&[Lifecycle::Serving], Lifecycle::Stopping)
                .is_ok()
            {
                self.run_cleanup();
                self.health.mark_shutting_down().await;
                self.shutdown.trigger();
                self.state.wait_for(Lifecycle::Stopped).await;
                tracing::info!("Graceful stop complete");
                return Ok(());
            }

            match self.state.current() {
                Lifecycle::Stopped => return Ok(()),
                Lifecycle::Stopping => {
                    self.state.wait_for(Lifecycle::Stopped).await;
                    return Ok(());
                }
                Lifecycle::Constructed | Lifecycle::Resolving => {
                    let advanced = self.state.advance_if(
                        &[Lifecycle::Constructed, Lifecycle::Resolving],
                        Lifecycle::Stopped,
                    );
                    if advanced.is_ok() {
                        // never served: finish teardown without a drain
                        self.run_cleanup();
                        self.health.mark_shutting_down().await;
                        if let Some(listener) = self.listener.lock().await.take() {
                            tracing::debug!(
                                owned = listener.is_owned(),
                                "Releasing unused listener"
                            );
                        }
                        tracing::info!("Stopped before serving");
                        return Ok(());
                    }
                    // lost a race with start(); re-evaluate the new state
                }
                Lifecycle::Serving => {
                    // lost the transition above to a concurrent caller; retry
                }
            }
        }
    }

    async fn resolve_endpoint(&self) -> Result<Url, ServerError> {
        let resolved = self
            .endpoint
            .get_or_try_init(|| async {
                let _ = self
                    .state
                    .advance_if(&[Lifecycle::Constructed], Lifecycle::Resolving);

                let mut slot = self.listener.lock().await;
                let handle = match slot.take() {
                    Some(handle) => handle,
                    None => {
                        ListenerHandle::bind(&self.config.network, &self.config.address).await?
                    }
                };

                let local = match handle.local_addr() {
                    Ok(local) => local,
                    Err(e) => {
                        *slot = Some(handle);
                        return Err(ServerError::Endpoint(format!(
                            "listener local address: {e}"
                        )));
                    }
                };
                let url = match endpoint::resolve(&self.config.address, local) {
                    Ok(url) => url,
                    Err(e) => {
                        *slot = Some(handle);
                        return Err(e);
                    }
                };
                *slot = Some(handle);

                tracing::info!(endpoint = %url, "Endpoint resolved");
                Ok(url)
            })
            .await
            .map(Url::clone);

        if resolved.is_err() {
            // nothing was memoized; fall back so a later call can retry
            let _ = self
                .state
                .advance_if(&[Lifecycle::Resolving], Lifecycle::Constructed);
        }
        resolved
    }

    fn run_cleanup(&self) {
        if let Some(hook) = self.cleanup.lock().unwrap().take() {
            tracing::debug!("Running cleanup hook");
            hook();
        }
    }
}

#[async_trait::async_trait]
impl Service for GrpcServer {
    async fn start(&self) -> Result<(), ServerError> {
        GrpcServer::start(self).await
    }

    async fn stop(&self) -> Result<(), ServerError> {
        GrpcServer::stop(self).await
    }
}

#[async_trait::async_trait]
impl EndPointer for GrpcServer {
    async fn endpoint(&self) -> Result<Url, ServerError> {
        GrpcServer::endpoint(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_endpoint_resolves_ephemeral_port() {
        let server = GrpcServer::builder().address("127.0.0.1:0").build();
        let url = server.endpoint().await.unwrap();
        assert_eq!(url.scheme(), "grpc");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_ne!(url.port(), Some(0));
    }

    #[tokio::test]
    async fn test_endpoint_is_memoized() {
        let server = GrpcServer::builder().address(":0").build();
        let first = server.endpoint().await.unwrap();
        let second = server.endpoint().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(server.lifecycle(), Lifecycle::Resolving);
    }

    #[tokio::test]
    async fn test_concurrent_endpoint_callers_share_one_bind() {
        // All racers resolving ":0" must observe the same URL: a second
        // bind would have produced a different ephemeral port.
        let server = Arc::new(GrpcServer::builder().address(":0").build());

        let mut racers = Vec::new();
        for _ in 0..16 {
            let server = server.clone();
            racers.push(tokio::spawn(async move { server.endpoint().await.unwrap() }));
        }

        let mut urls = Vec::new();
        for racer in racers {
            urls.push(racer.await.unwrap());
        }
        urls.dedup();
        assert_eq!(urls.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_failure_is_not_cached() {
        // port 1 needs privileges; the bind fails, and the error must not
        // poison the cell
        let server = GrpcServer::builder().address("127.0.0.1:1").build();
        assert!(server.endpoint().await.is_err());
        assert_eq!(server.lifecycle(), Lifecycle::Constructed);
        assert!(server.endpoint().await.is_err());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let server = GrpcServer::builder().build();
        server.stop().await.unwrap();
        assert_eq!(server.lifecycle(), Lifecycle::Stopped);

        // and again: still no error
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_after_stop_is_a_violation() {
        let server = GrpcServer::builder().build();
        server.stop().await.unwrap();

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, ServerError::Lifecycle(_)));
    }

    #[tokio::test]
    async fn test_cleanup_hook_runs_exactly_once() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let hooked = count.clone();
        let server = GrpcServer::builder()
            .on_cleanup(move || {
                hooked.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        server.stop().await.unwrap();
        server.stop().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_supplied_listener_is_used_and_survives_stop() {
        let listener =
            Arc::new(tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap());
        let bound = listener.local_addr().unwrap();

        let server = GrpcServer::builder().listener(listener.clone()).build();
        let url = server.endpoint().await.unwrap();
        // the exact supplied socket backs the endpoint: no second bind
        assert_eq!(url.port(), Some(bound.port()));

        server.stop().await.unwrap();

        // ownership stayed with the caller: the socket still accepts
        let (client, accepted) = tokio::join!(
            tokio::net::TcpStream::connect(bound),
            listener.accept()
        );
        client.unwrap();
        accepted.unwrap();
    }

    #[tokio::test]
    async fn test_owned_listener_is_released_on_cold_stop() {
        let server = GrpcServer::builder().address("127.0.0.1:0").build();
        let url = server.endpoint().await.unwrap();
        let port = url.port().unwrap();

        server.stop().await.unwrap();

        // the port is free again once the owned listener is dropped
        tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_follows_lifecycle() {
        let server = Arc::new(GrpcServer::builder().address("127.0.0.1:0").build());
        assert_eq!(server.health_state(), HealthState::NotServing);

        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.start().await })
        };

        // wait until the serve loop reports itself up
        server.state.wait_for(Lifecycle::Serving).await;
        assert_eq!(server.health_state(), HealthState::Serving);

        server.stop().await.unwrap();
        assert_eq!(server.health_state(), HealthState::ShuttingDown);
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_second_start_fails_fast() {
        let server = Arc::new(GrpcServer::builder().address("127.0.0.1:0").build());

        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.start().await })
        };
        server.state.wait_for(Lifecycle::Serving).await;

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, ServerError::Lifecycle(_)));

        server.stop().await.unwrap();
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_endpoint_identical_across_lifecycle() {
        let server = Arc::new(GrpcServer::builder().address("127.0.0.1:0").build());
        let before = server.endpoint().await.unwrap();

        let serving = {
            let server = server.clone();
            tokio::spawn(async move { server.start().await })
        };
        server.state.wait_for(Lifecycle::Serving).await;
        let during = server.endpoint().await.unwrap();

        server.stop().await.unwrap();
        serving.await.unwrap().unwrap();
        let after = server.endpoint().await.unwrap();

        assert_eq!(before, during);
        assert_eq!(before, after);
    }
}

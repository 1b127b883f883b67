//! Shared utilities for integration testing.

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use grpc_runner::{GrpcServer, Lifecycle, ServerError};
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use url::Url;

static INIT: Once = Once::new();

/// Initialize the tracing subscriber once for the whole test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "grpc_runner=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Run the server's serve loop on its own task.
pub fn spawn_server(server: Arc<GrpcServer>) -> tokio::task::JoinHandle<Result<(), ServerError>> {
    tokio::spawn(async move { server.start().await })
}

/// Poll until the server reaches `state`.
pub async fn wait_until(server: &GrpcServer, state: Lifecycle) {
    for _ in 0..200 {
        if server.lifecycle() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never reached {:?}", state);
}

/// The HTTP form of a resolved `grpc://` endpoint, for client connects.
pub fn http_endpoint(url: &Url) -> String {
    format!(
        "http://{}:{}",
        url.host_str().expect("endpoint has a host"),
        url.port().expect("endpoint has a port")
    )
}

/// Query the server-wide health status over the wire.
pub async fn probe_health(url: &Url) -> Result<i32, Box<dyn std::error::Error>> {
    let channel = tonic::transport::Endpoint::new(http_endpoint(url))?
        .connect()
        .await?;
    let mut client = HealthClient::new(channel);
    let response = client
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await?;
    Ok(response.into_inner().status)
}

/// Query health, retrying while the accept loop comes up.
#[allow(dead_code)]
pub async fn probe_health_with_retry(url: &Url) -> Result<i32, Box<dyn std::error::Error>> {
    let mut last = None;
    for _ in 0..50 {
        match probe_health(url).await {
            Ok(status) => return Ok(status),
            Err(e) => last = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Err(last.expect("at least one probe attempt"))
}

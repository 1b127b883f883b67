//! TCP listener handles for the gRPC server.
//!
//! # Responsibilities
//! - Bind to the configured address on first use
//! - Distinguish owned (self-bound) from shared (caller-supplied) listeners
//! - Adapt either kind into the connection stream the dispatch runtime
//!   consumes

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::net::{TcpListener, TcpStream};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::Stream;

use crate::error::ServerError;
use crate::grpc::endpoint;

/// A bound listener, tagged with who owns the underlying socket.
///
/// `Owned` listeners were bound by the server itself and are closed when the
/// handle (or the stream made from it) is dropped. `Shared` listeners were
/// supplied by the caller as an `Arc`; dropping the server's clone leaves
/// the caller's socket open.
#[derive(Debug)]
pub enum ListenerHandle {
    Owned(TcpListener),
    Shared(Arc<TcpListener>),
}

impl ListenerHandle {
    /// Bind a new owned listener for `network`+`address`.
    ///
    /// Only the "tcp" network kind is supported. Wildcard forms are
    /// accepted: an empty host binds the unspecified address, port 0 asks
    /// the OS for an ephemeral port.
    pub async fn bind(network: &str, address: &str) -> Result<Self, ServerError> {
        if network != "tcp" {
            return Err(ServerError::UnsupportedNetwork(network.to_string()));
        }

        let (host, port) = endpoint::split_host_port(address)?;
        let host = if host.is_empty() { "0.0.0.0".to_string() } else { host };
        let port = port.unwrap_or(0);

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| ServerError::Bind {
                address: address.to_string(),
                source: e,
            })?;

        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            address: address.to_string(),
            source: e,
        })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(ListenerHandle::Owned(listener))
    }

    /// The concrete local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            ListenerHandle::Owned(l) => l.local_addr(),
            ListenerHandle::Shared(l) => l.local_addr(),
        }
    }

    /// True if the server owns (and will close) the underlying socket.
    pub fn is_owned(&self) -> bool {
        matches!(self, ListenerHandle::Owned(_))
    }

    /// Consume the handle into the connection stream fed to the runtime.
    pub fn into_incoming(self) -> Incoming {
        match self {
            ListenerHandle::Owned(l) => Incoming::Owned(TcpListenerStream::new(l)),
            ListenerHandle::Shared(l) => Incoming::Shared(l),
        }
    }
}

/// Connection stream over either listener kind.
pub enum Incoming {
    Owned(TcpListenerStream),
    Shared(Arc<TcpListener>),
}

impl Stream for Incoming {
    type Item = std::io::Result<TcpStream>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut() {
            Incoming::Owned(stream) => Pin::new(stream).poll_next(cx),
            Incoming::Shared(listener) => listener
                .poll_accept(cx)
                .map(|res| Some(res.map(|(stream, _peer)| stream))),
        }
    }
}

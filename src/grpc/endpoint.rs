//! Endpoint resolution.
//!
//! # Responsibilities
//! - Split configured bind addresses into host and port parts
//! - Substitute wildcard parts with concrete values from the bound listener
//! - Produce the canonical externally reachable `grpc://host:port` URL
//!
//! # Design Decisions
//! - Only the unresolved portion of the address is substituted: an explicit
//!   host survives an ephemeral port, and vice versa
//! - A wildcard host advertised from a wildcard-bound listener falls back
//!   to loopback, which is the only address guaranteed reachable

use std::net::{IpAddr, SocketAddr};

use url::Url;

use crate::error::ServerError;

/// Scheme of every resolved endpoint.
pub const SCHEME: &str = "grpc";

/// Split an address string into host and optional port.
///
/// Accepted forms: `""`, `":0"`, `"host"`, `"host:port"`, `"[v6]:port"`,
/// and bare IPv6 literals (treated as a host with no port).
pub(crate) fn split_host_port(address: &str) -> Result<(String, Option<u16>), ServerError> {
    if address.is_empty() {
        return Ok((String::new(), None));
    }

    if let Some(rest) = address.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err(ServerError::Endpoint(format!(
                "unclosed bracket in address {address:?}"
            )));
        };
        let port = match after.strip_prefix(':') {
            Some(port) => Some(parse_port(port, address)?),
            None if after.is_empty() => None,
            None => {
                return Err(ServerError::Endpoint(format!(
                    "malformed address {address:?}"
                )))
            }
        };
        return Ok((host.to_string(), port));
    }

    match address.rsplit_once(':') {
        // more than one colon and no brackets: a bare IPv6 literal
        Some((host, _)) if host.contains(':') => Ok((address.to_string(), None)),
        Some((host, port)) => Ok((host.to_string(), Some(parse_port(port, address)?))),
        None => Ok((address.to_string(), None)),
    }
}

fn parse_port(port: &str, address: &str) -> Result<u16, ServerError> {
    port.parse()
        .map_err(|_| ServerError::Endpoint(format!("invalid port in address {address:?}")))
}

/// Resolve the externally reachable endpoint for `configured`, given the
/// concrete local address of the bound listener.
pub fn resolve(configured: &str, local: SocketAddr) -> Result<Url, ServerError> {
    let (host, port) = split_host_port(configured)?;

    let port = match port {
        Some(port) if port != 0 => port,
        _ => local.port(),
    };

    let wildcard_host = host.is_empty()
        || host
            .parse::<IpAddr>()
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false);

    let host = if wildcard_host {
        match local.ip() {
            IpAddr::V4(v4) if v4.is_unspecified() => "127.0.0.1".to_string(),
            IpAddr::V6(v6) if v6.is_unspecified() => "[::1]".to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
            IpAddr::V4(v4) => v4.to_string(),
        }
    } else if host.contains(':') {
        // bare IPv6 literal needs brackets inside a URL authority
        format!("[{host}]")
    } else {
        host
    };

    Url::parse(&format!("{SCHEME}://{host}:{port}"))
        .map_err(|e| ServerError::Endpoint(format!("invalid endpoint {host:?}:{port}: {e}")))
}

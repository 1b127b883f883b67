//! Lifecycle management for tonic gRPC services.
//!
//! # Architecture Overview
//!
//! ```text
//! GrpcServerBuilder ──build()──▶ GrpcServer
//!                                  │
//!            first start()/endpoint() resolves listener + endpoint
//!                                  │       (exactly once, memoized)
//!                                  ▼
//!                     health: NotServing → Serving
//!                                  │
//!                           tonic serve loop
//!                                  │
//!        stop(): cleanup hook → health: ShuttingDown → drain → close
//!
//! Runner: starts N services, stops them in reverse order on shutdown
//! ```
//!
//! A server's listening address is often unknown until bind time (`:0`
//! addresses). `GrpcServer` lets callers query the resolved endpoint before
//! or after `start`, idempotently and without re-binding, and coordinates
//! shutdown of health, in-flight draining, and cleanup in a fixed order.

// Core subsystems
pub mod config;
pub mod error;
pub mod grpc;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod runner;
pub mod transport;

pub use config::{AppConfig, RunnerConfig, ServerConfig};
pub use error::ServerError;
pub use grpc::{GrpcServer, GrpcServerBuilder, HealthState};
pub use lifecycle::{Lifecycle, Shutdown};
pub use runner::Runner;
pub use transport::{EndPointer, Service};

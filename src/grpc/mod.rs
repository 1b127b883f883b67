//! gRPC transport lifecycle management.
//!
//! # Data Flow
//! ```text
//! GrpcServerBuilder (builder.rs)
//!     → GrpcServer (server.rs)
//!     → first start()/endpoint() resolves listener + endpoint (endpoint.rs)
//!     → start() flips health (health.rs) and runs the tonic serve loop
//!     → stop() orders cleanup → health flip → drain → listener close
//! ```
//!
//! # Design Decisions
//! - The manager composes a tonic server; it does not re-expose the
//!   runtime's surface beyond the `Service`/`EndPointer` contracts
//! - Endpoint resolution is shared by `start` and `endpoint` and runs
//!   exactly once, whichever gets there first

pub mod builder;
pub mod endpoint;
pub mod health;
pub mod interceptor;
pub mod server;

pub use builder::GrpcServerBuilder;
pub use health::HealthState;
pub use interceptor::interceptor_fn;
pub use interceptor::InterceptorFn;
pub use server::CleanupFn;
pub use server::GrpcServer;
pub use server::RuntimeTweak;

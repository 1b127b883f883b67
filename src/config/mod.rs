//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → AppConfig (immutable)
//!     → GrpcServerBuilder::from_config / Runner::from_config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal (or empty) config files
//! - No semantic validation at load time: invalid bind combinations are
//!   only detectable at bind time and surface there

pub mod loader;
pub mod schema;

pub use schema::AppConfig;
pub use schema::RunnerConfig;
pub use schema::ServerConfig;

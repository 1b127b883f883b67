//! Lifecycle coordination.
//!
//! # State Machine (state.rs)
//! ```text
//! Constructed → Resolving: first start() or endpoint()
//! Resolving   → Serving:   start() only, after bind + health flip
//! Resolving   → Constructed: resolution failed (nothing memoized)
//! Serving     → Stopping:  stop()
//! Stopping    → Stopped:   drain complete (terminal)
//! ```
//!
//! # Shutdown Signal (shutdown.rs)
//! One-shot broadcast that the serve loop and runner tasks subscribe to.

pub mod shutdown;
pub mod state;

pub use shutdown::Shutdown;
pub use state::Lifecycle;
pub use state::StateCell;

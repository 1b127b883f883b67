//! Listener plumbing.
//!
//! # Design Decisions
//! - Self-bound listeners are owned by the server and closed (dropped) when
//!   the serve loop ends
//! - Caller-supplied listeners are shared (`Arc`); the server only drops its
//!   own clone and the caller's socket stays open
//! - Both kinds feed the dispatch runtime through the same `Incoming` stream

pub mod listener;

pub use listener::Incoming;
pub use listener::ListenerHandle;

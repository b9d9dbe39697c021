//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → return from wait_for_signal
//!
//! Shutdown (shutdown.rs):
//!     trigger → acceptors stop, connection tasks close their sockets
//! ```
//!
//! # Design Decisions
//! - Shutdown is hard: in-flight connections are not drained
//! - The signal is level-triggered; tasks started after the trigger still see it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};

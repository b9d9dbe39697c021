//! Command dispatch.
//!
//! # Data Flow
//! ```text
//! (CommandType, payload)
//!     → dispatcher.rs (parse payload, one collaborator call)
//!     → Response::{LoginAck, SimpleAck}   on success
//!     → error.rs → Response::ErrorAck    on any failure
//! ```
//!
//! # Design Decisions
//! - Failures never escape the dispatcher; each becomes an error ack
//! - No retries; exactly one collaborator call per frame
//! - Runs inline on the connection task, so per-connection ordering holds

pub mod dispatcher;
pub mod error;

pub use dispatcher::Dispatcher;
pub use error::CommandError;

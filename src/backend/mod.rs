//! Collaborators the receiver hands decoded commands to.
//!
//! # Data Flow
//! ```text
//! Login / Logout frame
//!     → session.rs (SessionBackend: credential check, session issue/revoke)
//!
//! Publish frame (raw payload + session id)
//!     → publish.rs (PublishPipeline: session check, hand-off downstream)
//!     → event.rs (EventConverter: payload bytes → events)
//! ```
//!
//! # Design Decisions
//! - Traits are object safe and `Send + Sync`; one instance serves every
//!   connection concurrently, without extra locking in the receiver
//! - Every failure type carries a stable `class_name()` reported to clients
//! - The in-memory implementations back the standalone binary and the tests

pub mod event;
pub mod publish;
pub mod session;

pub use event::{BinaryEventConverter, ConversionError, Event, EventConverter};
pub use publish::{ChannelPipeline, EventBatch, PublishError, PublishPipeline};
pub use session::{AuthError, InMemorySessionBackend, SessionBackend, SessionError, SessionId};

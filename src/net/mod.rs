//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (acceptor pool sharing one listening socket)
//!     → tls.rs (optional TLS handshake, in the connection task)
//!     → connection.rs (frame loop, lifecycle tracking)
//!     → Hand off to the dispatcher, one frame at a time
//!
//! Connection States:
//!     Reading → Dispatching → Reading → … → Closed
//! ```
//!
//! # Design Decisions
//! - One task per connection for its whole lifetime
//! - Framing and I/O errors close only the affected connection
//! - No read timeout unless one is configured

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{Connection, ConnectionError, ConnectionSettings, ConnectionState};
pub use listener::{ListenerError, RunningListener, TransportKind, TransportListener};
pub use tls::{load_tls_acceptor, StartupError, TlsIdentity};

//! Binary wire protocol subsystem.
//!
//! # Data Flow
//! ```text
//! socket bytes
//!     → frame.rs (command byte + 4-byte BE length + payload)
//!     → request.rs (login / session-prefix payload parsing)
//!     → dispatcher
//!     → response.rs (tagged ack / error encoding, flushed per response)
//!     → socket bytes
//! ```
//!
//! # Wire Layout
//! ```text
//! request:  [1B command][4B BE length][payload]
//! response: [1B tag] then tag-specific fields
//! ```
//!
//! # Design Decisions
//! - Request commands and response tags are separate enums; tag `2` means
//!   Publish in one direction and LoginOk in the other
//! - All integers are big-endian, all strings UTF-8 with byte-counted lengths
//! - Truncated input is a framing error, never a partial frame

pub mod frame;
pub mod request;
pub mod response;

pub use frame::{read_frame, CommandType, Frame, FramingError, UnsupportedCommand};
pub use request::{LoginRequest, PayloadError, SessionPrefix};
pub use response::{read_response, write_response, Response, ResponseTag};

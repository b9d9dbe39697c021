//! Publish payload to event conversion.
//!
//! # Binary event layout
//! ```text
//! [4B sessionIdLen][sessionId]          session prefix, skipped
//! [4B eventCount]
//! eventCount × {
//!     [8B timestamp (ms, signed)]
//!     [4B streamIdLen][streamId]
//!     [4B attributesLen][attributes]    opaque, decoded downstream
//! }
//! ```

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::request::{PayloadError, PayloadReader};

/// One event extracted from a publish payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub stream_id: String,
    /// Milliseconds since the Unix epoch, as sent by the agent.
    pub timestamp: i64,
    /// Attribute block, interpreted against the stream definition downstream.
    pub attributes: Bytes,
}

/// Event bytes that do not follow the expected layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed event data: {0}")]
pub struct ConversionError(#[from] pub PayloadError);

/// Turns a raw publish payload into events.
///
/// Receives the full payload, session prefix included.
pub trait EventConverter: Send + Sync {
    fn to_events(&self, payload: &Bytes) -> Result<Vec<Event>, ConversionError>;
}

/// Converter for the binary transport's event layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryEventConverter;

impl EventConverter for BinaryEventConverter {
    fn to_events(&self, payload: &Bytes) -> Result<Vec<Event>, ConversionError> {
        let mut reader = PayloadReader::new(payload);
        let session_len = reader.u32("session id length")? as usize;
        reader.take("session id", session_len)?;

        let count = reader.u32("event count")? as usize;
        // Each event needs at least 16 bytes; never reserve more than could fit.
        let mut events = Vec::with_capacity(count.min(payload.len() / 16));
        for _ in 0..count {
            let timestamp = reader.u64("event timestamp")? as i64;
            let stream_len = reader.u32("stream id length")? as usize;
            let stream_id = reader.string("stream id", stream_len)?;
            let attributes_len = reader.u32("attributes length")? as usize;
            let start = reader.position();
            reader.take("attributes", attributes_len)?;
            events.push(Event {
                stream_id,
                timestamp,
                attributes: payload.slice(start..start + attributes_len),
            });
        }
        Ok(events)
    }
}

//! Hand-off of published payloads to the processing pipeline.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::backend::event::{ConversionError, Event, EventConverter};
use crate::backend::session::{InMemorySessionBackend, SessionError};

/// Publish failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The session is unknown or no longer valid.
    #[error(transparent)]
    InvalidSession(#[from] SessionError),

    /// The event bytes could not be decoded.
    #[error(transparent)]
    MalformedEvent(#[from] ConversionError),

    /// The pipeline refused the events.
    #[error("events rejected: {0}")]
    Rejected(String),
}

impl PublishError {
    pub fn class_name(&self) -> &'static str {
        match self {
            PublishError::InvalidSession(_) => "PublishError::InvalidSession",
            PublishError::MalformedEvent(_) => "PublishError::MalformedEvent",
            PublishError::Rejected(_) => "PublishError::Rejected",
        }
    }
}

/// Accepts published payloads on behalf of a session.
pub trait PublishPipeline: Send + Sync {
    /// Publish the events in `payload`.
    ///
    /// `payload` is the unmodified frame payload, session prefix included;
    /// `converter` knows how to skip the prefix and decode the rest.
    fn publish(
        &self,
        payload: Bytes,
        session_id: &str,
        converter: &dyn EventConverter,
    ) -> Result<(), PublishError>;
}

/// Events from one publish frame.
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub session_id: String,
    pub username: String,
    pub events: Vec<Event>,
}

/// Pipeline that validates the session and forwards batches over a channel.
#[derive(Clone)]
pub struct ChannelPipeline {
    sessions: InMemorySessionBackend,
    tx: mpsc::UnboundedSender<EventBatch>,
}

impl ChannelPipeline {
    /// Create the pipeline and the receiving end for the downstream stage.
    pub fn new(sessions: InMemorySessionBackend) -> (Self, mpsc::UnboundedReceiver<EventBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sessions, tx }, rx)
    }
}

impl PublishPipeline for ChannelPipeline {
    fn publish(
        &self,
        payload: Bytes,
        session_id: &str,
        converter: &dyn EventConverter,
    ) -> Result<(), PublishError> {
        let username = self.sessions.validate(session_id)?;
        let events = converter.to_events(&payload)?;

        tracing::trace!(session_id, events = events.len(), "Forwarding event batch");

        self.tx
            .send(EventBatch {
                session_id: session_id.to_owned(),
                username,
                events,
            })
            .map_err(|_| PublishError::Rejected("event pipeline is closed".to_string()))
    }
}

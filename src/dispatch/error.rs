//! Command failures reported to clients.

use thiserror::Error;

use crate::backend::{AuthError, PublishError, SessionError};
use crate::protocol::{PayloadError, Response};

/// Any failure while executing a known command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl CommandError {
    /// Category name sent in the error ack.
    pub fn class_name(&self) -> &'static str {
        match self {
            CommandError::Auth(e) => e.class_name(),
            CommandError::Session(e) => e.class_name(),
            CommandError::Publish(e) => e.class_name(),
            CommandError::Payload(e) => e.class_name(),
        }
    }

    pub fn to_response(&self) -> Response {
        Response::error(self.class_name(), self.to_string())
    }
}

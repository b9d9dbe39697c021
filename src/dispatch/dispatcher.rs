//! Command dispatcher.
//!
//! # Responsibilities
//! - Parse the payload according to the command type
//! - Call the session backend or publish pipeline exactly once
//! - Convert the outcome into a response frame

use std::sync::Arc;

use bytes::Bytes;

use crate::backend::{BinaryEventConverter, EventConverter, PublishPipeline, SessionBackend};
use crate::dispatch::error::CommandError;
use crate::observability::metrics;
use crate::protocol::{CommandType, LoginRequest, Response, SessionPrefix};

/// Routes decoded commands to the collaborators.
///
/// Shared by every connection of every transport.
#[derive(Clone)]
pub struct Dispatcher {
    sessions: Arc<dyn SessionBackend>,
    pipeline: Arc<dyn PublishPipeline>,
    converter: Arc<dyn EventConverter>,
}

impl Dispatcher {
    /// Create a dispatcher using the binary event layout for publish payloads.
    pub fn new(sessions: Arc<dyn SessionBackend>, pipeline: Arc<dyn PublishPipeline>) -> Self {
        Self {
            sessions,
            pipeline,
            converter: Arc::new(BinaryEventConverter),
        }
    }

    /// Replace the converter handed to the publish pipeline.
    pub fn with_converter(mut self, converter: Arc<dyn EventConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Execute one command and produce its response.
    pub fn dispatch(&self, command: CommandType, payload: Bytes) -> Response {
        metrics::record_frame(command.as_str());

        let result = match command {
            CommandType::Login => self.login(&payload),
            CommandType::Logout => self.logout(&payload),
            CommandType::Publish => self.publish(payload),
        };

        result.unwrap_or_else(|err| {
            tracing::warn!(
                command = %command,
                class_name = err.class_name(),
                error = %err,
                "Command failed"
            );
            metrics::record_command_error(err.class_name());
            err.to_response()
        })
    }

    fn login(&self, payload: &[u8]) -> Result<Response, CommandError> {
        let request = LoginRequest::parse(payload)?;
        let session_id = self.sessions.login(&request.username, &request.password)?;
        tracing::info!(username = %request.username, "Agent logged in");
        Ok(Response::LoginAck {
            session_id: session_id.into_string(),
        })
    }

    fn logout(&self, payload: &[u8]) -> Result<Response, CommandError> {
        let prefix = SessionPrefix::parse(payload)?;
        self.sessions.logout(&prefix.session_id)?;
        tracing::info!(session_id = %prefix.session_id, "Agent logged out");
        Ok(Response::SimpleAck)
    }

    fn publish(&self, payload: Bytes) -> Result<Response, CommandError> {
        let prefix = SessionPrefix::parse(&payload)?;
        self.pipeline
            .publish(payload, &prefix.session_id, self.converter.as_ref())?;
        Ok(Response::SimpleAck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthError, PublishError, SessionError, SessionId};
    use std::sync::Mutex;

    /// Backend that accepts bob/pwd with a fixed session id.
    struct FixedSessions;

    impl SessionBackend for FixedSessions {
        fn login(&self, username: &str, password: &str) -> Result<SessionId, AuthError> {
            if username == "bob" && password == "pwd" {
                Ok(SessionId::new("S1"))
            } else {
                Err(AuthError::InvalidCredentials {
                    username: username.to_owned(),
                })
            }
        }

        fn logout(&self, session_id: &str) -> Result<(), SessionError> {
            if session_id == "S1" {
                Ok(())
            } else {
                Err(SessionError::UnknownSession(session_id.to_owned()))
            }
        }
    }

    /// Pipeline that records what it was given.
    #[derive(Default)]
    struct RecordingPipeline {
        calls: Mutex<Vec<(Bytes, String)>>,
    }

    impl PublishPipeline for RecordingPipeline {
        fn publish(
            &self,
            payload: Bytes,
            session_id: &str,
            _converter: &dyn EventConverter,
        ) -> Result<(), PublishError> {
            if session_id != "S1" {
                return Err(PublishError::InvalidSession(SessionError::UnknownSession(
                    session_id.to_owned(),
                )));
            }
            self.calls.lock().unwrap().push((payload, session_id.to_owned()));
            Ok(())
        }
    }

    fn dispatcher() -> (Dispatcher, Arc<RecordingPipeline>) {
        let pipeline = Arc::new(RecordingPipeline::default());
        (Dispatcher::new(Arc::new(FixedSessions), pipeline.clone()), pipeline)
    }

    #[test]
    fn login_returns_backend_session() {
        let (dispatcher, _) = dispatcher();
        let response = dispatcher.dispatch(CommandType::Login, LoginRequest::new("bob", "pwd").encode());
        assert_eq!(&response.encode()[..], &[2, 0, 0, 0, 2, b'S', b'1']);
    }

    #[test]
    fn bad_credentials_become_error_ack() {
        let (dispatcher, _) = dispatcher();
        let response = dispatcher.dispatch(CommandType::Login, LoginRequest::new("bob", "x").encode());
        assert_eq!(
            response,
            Response::error("AuthError::InvalidCredentials", "authentication failed for user bob")
        );
    }

    #[test]
    fn malformed_login_becomes_error_ack() {
        let (dispatcher, _) = dispatcher();
        let response = dispatcher.dispatch(CommandType::Login, Bytes::from_static(&[0, 0, 0, 9]));
        match response {
            Response::ErrorAck { class_name, .. } => assert_eq!(class_name, "PayloadError::OutOfBounds"),
            other => panic!("expected error ack, got {other:?}"),
        }
    }

    #[test]
    fn logout_known_session_is_simple_ack() {
        let (dispatcher, _) = dispatcher();
        let payload = SessionPrefix::encode_with("S1", &[]);
        assert_eq!(dispatcher.dispatch(CommandType::Logout, payload), Response::SimpleAck);
    }

    #[test]
    fn logout_unknown_session_is_error_ack() {
        let (dispatcher, _) = dispatcher();
        let payload = SessionPrefix::encode_with("S9", &[]);
        let encoded = dispatcher.dispatch(CommandType::Logout, payload).encode();
        assert_eq!(encoded[0], 1);
        let (decoded, _) = Response::decode(&encoded).unwrap();
        assert_eq!(
            decoded,
            Response::error("SessionError::UnknownSession", "no session found for id S9")
        );
    }

    #[test]
    fn publish_forwards_full_payload() {
        let (dispatcher, pipeline) = dispatcher();
        let payload = SessionPrefix::encode_with("S1", b"\x00\x00\x00\x00");
        let response = dispatcher.dispatch(CommandType::Publish, payload.clone());
        assert_eq!(response, Response::SimpleAck);

        let calls = pipeline.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, payload);
        assert_eq!(calls[0].1, "S1");
    }

    #[test]
    fn publish_with_unknown_session_is_error_ack() {
        let (dispatcher, pipeline) = dispatcher();
        let payload = SessionPrefix::encode_with("nope", b"");
        let response = dispatcher.dispatch(CommandType::Publish, payload);
        assert_eq!(response.tag(), crate::protocol::ResponseTag::Error);
        assert!(pipeline.calls.lock().unwrap().is_empty());
    }
}

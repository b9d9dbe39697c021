//! Request payload parsing.
//!
//! Login payloads carry both lengths up front, then both strings:
//! `[4B userLen][4B passLen][user][pass]`. Logout and Publish payloads start
//! with a session prefix: `[4B sessionIdLen][sessionId]`.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// A payload whose contents do not match its command's layout.
///
/// Unlike framing errors these are reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// A length field or string runs past the end of the payload.
    #[error("malformed {field}: needs {needed} bytes at offset {offset}, payload has {available}")]
    OutOfBounds {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// A response tag outside the known set.
    #[error("unknown response tag {0}")]
    UnknownTag(u8),
}

impl PayloadError {
    /// Category reported to clients in error acks.
    pub fn class_name(&self) -> &'static str {
        match self {
            PayloadError::OutOfBounds { .. } => "PayloadError::OutOfBounds",
            PayloadError::InvalidUtf8 { .. } => "PayloadError::InvalidUtf8",
            PayloadError::UnknownTag(_) => "PayloadError::UnknownTag",
        }
    }
}

/// Bounds-checked cursor over a payload.
pub(crate) struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], PayloadError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(PayloadError::OutOfBounds {
                field,
                offset: self.pos,
                needed: len,
                available: self.buf.len(),
            }),
        }
    }

    pub(crate) fn u32(&mut self, field: &'static str) -> Result<u32, PayloadError> {
        let bytes = self.take(field, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn u64(&mut self, field: &'static str) -> Result<u64, PayloadError> {
        let bytes = self.take(field, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    pub(crate) fn string(&mut self, field: &'static str, len: usize) -> Result<String, PayloadError> {
        let bytes = self.take(field, len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| PayloadError::InvalidUtf8 { field })
    }
}

/// Credentials carried by a Login frame.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse a Login payload.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);
        let username_len = reader.u32("username length")? as usize;
        let password_len = reader.u32("password length")? as usize;
        let username = reader.string("username", username_len)?;
        let password = reader.string("password", password_len)?;
        Ok(Self { username, password })
    }

    /// Encode as a Login payload (without the frame header).
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8 + self.username.len() + self.password.len());
        buf.put_u32(self.username.len() as u32);
        buf.put_u32(self.password.len() as u32);
        buf.put_slice(self.username.as_bytes());
        buf.put_slice(self.password.as_bytes());
        buf.freeze()
    }
}

/// Session identifier prefix shared by Logout and Publish payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPrefix {
    pub session_id: String,
    /// Number of payload bytes the prefix occupies.
    pub len: usize,
}

impl SessionPrefix {
    /// Parse the prefix at the start of `payload`. Trailing bytes are ignored.
    pub fn parse(payload: &[u8]) -> Result<Self, PayloadError> {
        let mut reader = PayloadReader::new(payload);
        let id_len = reader.u32("session id length")? as usize;
        let session_id = reader.string("session id", id_len)?;
        Ok(Self {
            session_id,
            len: reader.position(),
        })
    }

    /// Encode a session prefix followed by `body`.
    pub fn encode_with(session_id: &str, body: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + session_id.len() + body.len());
        buf.put_u32(session_id.len() as u32);
        buf.put_slice(session_id.as_bytes());
        buf.put_slice(body);
        buf.freeze()
    }
}

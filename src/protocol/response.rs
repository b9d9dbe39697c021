//! Response encoding.
//!
//! ```text
//! tag 0  simple ack    (no body)
//! tag 1  error ack     [4B classNameLen][4B messageLen][className][message]
//! tag 2  login ack     [4B sessionIdLen][sessionId]
//! ```
//!
//! Every write helper flushes before returning, so the peer sees a complete
//! response before the next request is read.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::frame::{FramingError, INITIAL_PAYLOAD_CAPACITY};
use crate::protocol::request::{PayloadError, PayloadReader};

/// Leading byte of every response. Response direction only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseTag {
    Ok = 0,
    Error = 1,
    LoginOk = 2,
}

impl TryFrom<u8> for ResponseTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(ResponseTag::Ok),
            1 => Ok(ResponseTag::Error),
            2 => Ok(ResponseTag::LoginOk),
            other => Err(other),
        }
    }
}

/// A reply to one request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Successful login carrying the issued session id.
    LoginAck { session_id: String },
    /// Successful logout or publish.
    SimpleAck,
    /// Any command failure.
    ErrorAck { class_name: String, message: String },
}

impl Response {
    pub fn error(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Response::ErrorAck {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    pub fn tag(&self) -> ResponseTag {
        match self {
            Response::LoginAck { .. } => ResponseTag::LoginOk,
            Response::SimpleAck => ResponseTag::Ok,
            Response::ErrorAck { .. } => ResponseTag::Error,
        }
    }

    /// Encode the full response, tag included.
    pub fn encode(&self) -> Bytes {
        match self {
            Response::SimpleAck => Bytes::from_static(&[ResponseTag::Ok as u8]),
            Response::LoginAck { session_id } => {
                let mut buf = BytesMut::with_capacity(5 + session_id.len());
                buf.put_u8(ResponseTag::LoginOk as u8);
                buf.put_u32(session_id.len() as u32);
                buf.put_slice(session_id.as_bytes());
                buf.freeze()
            }
            Response::ErrorAck { class_name, message } => {
                let mut buf = BytesMut::with_capacity(9 + class_name.len() + message.len());
                buf.put_u8(ResponseTag::Error as u8);
                buf.put_u32(class_name.len() as u32);
                buf.put_u32(message.len() as u32);
                buf.put_slice(class_name.as_bytes());
                buf.put_slice(message.as_bytes());
                buf.freeze()
            }
        }
    }

    /// Decode one response from the start of `buf`.
    ///
    /// Returns the response and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), PayloadError> {
        let mut reader = PayloadReader::new(buf);
        let tag = reader.take("response tag", 1)?[0];
        let response = match ResponseTag::try_from(tag) {
            Ok(ResponseTag::Ok) => Response::SimpleAck,
            Ok(ResponseTag::LoginOk) => {
                let len = reader.u32("session id length")? as usize;
                Response::LoginAck {
                    session_id: reader.string("session id", len)?,
                }
            }
            Ok(ResponseTag::Error) => {
                let class_len = reader.u32("class name length")? as usize;
                let message_len = reader.u32("message length")? as usize;
                Response::ErrorAck {
                    class_name: reader.string("class name", class_len)?,
                    message: reader.string("message", message_len)?,
                }
            }
            Err(other) => return Err(PayloadError::UnknownTag(other)),
        };
        Ok((response, reader.position()))
    }
}

/// Write a response and flush it.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&response.encode()).await?;
    writer.flush().await
}

pub async fn write_login_ack<W>(writer: &mut W, session_id: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(
        writer,
        &Response::LoginAck {
            session_id: session_id.to_owned(),
        },
    )
    .await
}

pub async fn write_simple_ack<W>(writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(writer, &Response::SimpleAck).await
}

pub async fn write_error_ack<W>(writer: &mut W, class_name: &str, message: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_response(writer, &Response::error(class_name, message)).await
}

/// Read one response from a stream. Peer side of the protocol.
pub async fn read_response<R>(reader: &mut R) -> Result<Response, FramingError>
where
    R: AsyncRead + Unpin,
{
    let tag = reader.read_u8().await?;
    let response = match ResponseTag::try_from(tag) {
        Ok(ResponseTag::Ok) => Response::SimpleAck,
        Ok(ResponseTag::LoginOk) => {
            let len = reader.read_u32().await? as usize;
            Response::LoginAck {
                session_id: read_string(reader, "session id", len).await?,
            }
        }
        Ok(ResponseTag::Error) => {
            let class_len = reader.read_u32().await? as usize;
            let message_len = reader.read_u32().await? as usize;
            Response::ErrorAck {
                class_name: read_string(reader, "class name", class_len).await?,
                message: read_string(reader, "message", message_len).await?,
            }
        }
        Err(other) => {
            return Err(FramingError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown response tag {other}"),
            )))
        }
    };
    Ok(response)
}

async fn read_string<R>(reader: &mut R, section: &'static str, len: usize) -> Result<String, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(len.min(INITIAL_PAYLOAD_CAPACITY));
    let received = (&mut *reader).take(len as u64).read_to_end(&mut buf).await?;
    if received < len {
        return Err(FramingError::Truncated {
            section,
            expected: len,
            received,
        });
    }
    String::from_utf8(buf).map_err(|e| {
        FramingError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

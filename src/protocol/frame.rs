//! Request frame decoding.
//!
//! # Responsibilities
//! - Read one `[command][length][payload]` frame from a byte stream
//! - Distinguish a clean end-of-stream from a frame cut off mid-way
//! - Map raw command bytes onto the known command set

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the fixed frame header: command byte plus 4-byte length.
pub const HEADER_LEN: usize = 5;

/// Upper bound on the buffer reserved before payload bytes actually arrive.
pub(crate) const INITIAL_PAYLOAD_CAPACITY: usize = 8 * 1024;

/// Commands a client can send. Request direction only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    Login = 0,
    Logout = 1,
    Publish = 2,
}

impl CommandType {
    /// Name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Login => "login",
            CommandType::Logout => "logout",
            CommandType::Publish => "publish",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command byte outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("message type {0} is not supported")]
pub struct UnsupportedCommand(pub u8);

impl TryFrom<u8> for CommandType {
    type Error = UnsupportedCommand;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommandType::Login),
            1 => Ok(CommandType::Logout),
            2 => Ok(CommandType::Publish),
            other => Err(UnsupportedCommand(other)),
        }
    }
}

impl From<CommandType> for u8 {
    fn from(command: CommandType) -> Self {
        command as u8
    }
}

/// One decoded request frame.
///
/// The command byte is kept raw so that unknown commands can be reported
/// by the connection without being treated as framing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw command byte as received.
    pub command: u8,
    /// Payload exactly as declared by the length prefix.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame for a known command.
    pub fn new(command: CommandType, payload: impl Into<Bytes>) -> Self {
        Self {
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// Interpret the raw command byte.
    pub fn command_type(&self) -> Result<CommandType, UnsupportedCommand> {
        CommandType::try_from(self.command)
    }

    /// Encode the frame as it travels on the wire.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.command);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Errors that make the byte stream unusable. Always fatal to the connection.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The stream ended inside a frame.
    #[error("stream closed mid-frame: expected {expected} {section} bytes, got {received}")]
    Truncated {
        section: &'static str,
        expected: usize,
        received: usize,
    },

    /// The declared payload length exceeds the configured maximum.
    #[error("declared payload of {declared} bytes exceeds limit of {limit} bytes")]
    Oversized { declared: usize, limit: usize },

    /// Underlying transport failure while reading.
    #[error("I/O error while reading frame: {0}")]
    Io(#[from] std::io::Error),
}

impl FramingError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FramingError::Truncated { .. } => "truncated",
            FramingError::Oversized { .. } => "oversized",
            FramingError::Io(_) => "io",
        }
    }
}

/// Read the next frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends cleanly before a command byte,
/// which is how a peer ends its session.
pub async fn read_frame<R>(reader: &mut R, max_payload: usize) -> Result<Option<Frame>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let command = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(FramingError::Io(e)),
    };

    let mut length = [0u8; 4];
    let received = read_fully(reader, &mut length).await?;
    if received < length.len() {
        return Err(FramingError::Truncated {
            section: "length",
            expected: length.len(),
            received,
        });
    }
    let declared = u32::from_be_bytes(length) as usize;

    if declared > max_payload {
        return Err(FramingError::Oversized {
            declared,
            limit: max_payload,
        });
    }

    // Grow with the data actually received rather than trusting the prefix.
    let mut payload = Vec::with_capacity(declared.min(INITIAL_PAYLOAD_CAPACITY));
    let received = (&mut *reader)
        .take(declared as u64)
        .read_to_end(&mut payload)
        .await?;
    if received < declared {
        return Err(FramingError::Truncated {
            section: "payload",
            expected: declared,
            received,
        });
    }

    Ok(Some(Frame {
        command,
        payload: Bytes::from(payload),
    }))
}

/// Fill `buf` as far as the stream allows, returning how many bytes arrived.
async fn read_fully<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

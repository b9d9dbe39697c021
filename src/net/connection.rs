//! Per-connection frame loop.
//!
//! # Responsibilities
//! - Run the read-frame / dispatch / write-response cycle for one socket
//! - Expose the loop state (Reading → Dispatching → Reading … → Closed)
//! - Number connections and count the open ones per transport

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, BufStream};

use crate::config::ConnectionConfig;
use crate::dispatch::Dispatcher;
use crate::lifecycle::ShutdownSignal;
use crate::net::listener::TransportKind;
use crate::observability::metrics;
use crate::protocol::{self, write_response, Frame, FramingError};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-wide connection number, shown as `conn-N` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        // Only uniqueness matters here.
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Where a connection is in its frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for or decoding the next frame.
    Reading,
    /// Executing a command and writing its response.
    Dispatching,
    Closed,
}

/// Live connection count for one transport, shared by its acceptors.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
    transport: TransportKind,
}

impl ConnectionTracker {
    pub fn new(transport: TransportKind) -> Self {
        Self {
            open: Arc::new(AtomicU64::new(0)),
            transport,
        }
    }

    /// Count a newly accepted connection until the returned guard drops.
    pub fn track(&self) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        metrics::record_connection_opened(self.transport.as_str());
        ConnectionGuard {
            open: Arc::clone(&self.open),
            transport: self.transport,
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Held by a connection task for as long as its socket is open.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    transport: TransportKind,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        metrics::record_connection_closed(self.transport.as_str());
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}

/// Per-connection limits, copied into every connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub max_payload_bytes: usize,
    /// Longest wait for a complete frame. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl From<&ConnectionConfig> for ConnectionSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            max_payload_bytes: config.max_payload_bytes,
            idle_timeout: config.idle_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ConnectionConfig::default())
    }
}

/// Reasons a connection ends abnormally. All are fatal to the connection only.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error("no complete frame within {0:?}")]
    IdleTimeout(Duration),

    #[error("failed to write response: {0}")]
    Write(#[source] std::io::Error),

    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
}

/// One accepted connection and its frame loop.
pub struct Connection<S> {
    stream: BufStream<S>,
    peer: SocketAddr,
    guard: ConnectionGuard,
    dispatcher: Arc<Dispatcher>,
    settings: ConnectionSettings,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: SocketAddr,
        guard: ConnectionGuard,
        dispatcher: Arc<Dispatcher>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            stream: BufStream::new(stream),
            peer,
            guard,
            dispatcher,
            settings,
            state: ConnectionState::Reading,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serve frames until the peer closes, an error occurs, or shutdown.
    ///
    /// The response to each frame is flushed before the next frame is read.
    pub async fn run(&mut self, shutdown: &mut ShutdownSignal) -> Result<(), ConnectionError> {
        let result = self.serve(shutdown).await;
        self.state = ConnectionState::Closed;
        result
    }

    async fn serve(&mut self, shutdown: &mut ShutdownSignal) -> Result<(), ConnectionError> {
        loop {
            self.state = ConnectionState::Reading;
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::debug!("Closing connection on shutdown");
                    return Ok(());
                }
                next = self.next_frame() => next?,
            };

            let Some(frame) = next else {
                tracing::debug!("Peer closed connection");
                return Ok(());
            };

            self.state = ConnectionState::Dispatching;
            self.handle_frame(frame).await?;
        }
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        let read = protocol::read_frame(&mut self.stream, self.settings.max_payload_bytes);
        match self.settings.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| ConnectionError::IdleTimeout(limit))?
                .map_err(ConnectionError::from),
            None => read.await.map_err(ConnectionError::from),
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        match frame.command_type() {
            Ok(command) => {
                tracing::trace!(command = %command, payload_len = frame.payload.len(), "Dispatching frame");
                let response = self.dispatcher.dispatch(command, frame.payload);
                write_response(&mut self.stream, &response)
                    .await
                    .map_err(ConnectionError::Write)
            }
            Err(unsupported) => {
                // Newer or older clients may send commands we do not know; skip them.
                tracing::warn!(command = unsupported.0, "{}, frame dropped", unsupported);
                metrics::record_unsupported_command();
                Ok(())
            }
        }
    }
}

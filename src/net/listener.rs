//! Transport listener with a pool of acceptors.
//!
//! # Responsibilities
//! - Bind one listening socket per transport (plaintext or TLS)
//! - Run `pool_size` acceptor tasks that all accept on that socket
//! - Hand every accepted socket to its own connection task
//! - Stop accepting when shutdown is signaled
//!
//! # Design Decisions
//! - Tokio delivers each accepted socket to exactly one pending `accept`
//! - TLS handshakes run in the connection task, never in an acceptor
//! - An accept error is logged and ends that acceptor only

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::dispatch::Dispatcher;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::connection::{Connection, ConnectionError, ConnectionSettings, ConnectionTracker};
use crate::observability::metrics;

/// Which transport a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Tls,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Tls => "tls",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
    /// A pool of zero acceptors would never accept anything.
    EmptyPool(TransportKind),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::EmptyPool(kind) => write!(f, "{} pool_size must be at least 1", kind),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bound listening socket that has not started accepting yet.
pub struct TransportListener {
    kind: TransportKind,
    /// The underlying TCP listener, shared by all acceptors.
    inner: Arc<TcpListener>,
    /// Present for the TLS transport.
    tls: Option<TlsAcceptor>,
    /// Number of acceptor tasks to run.
    pool_size: usize,
    tracker: ConnectionTracker,
}

impl TransportListener {
    /// Bind a plaintext listener.
    pub async fn bind_tcp(host: &str, port: u16, pool_size: usize) -> Result<Self, ListenerError> {
        Self::bind(TransportKind::Tcp, host, port, pool_size, None).await
    }

    /// Bind a TLS listener.
    pub async fn bind_tls(
        host: &str,
        port: u16,
        pool_size: usize,
        acceptor: TlsAcceptor,
    ) -> Result<Self, ListenerError> {
        Self::bind(TransportKind::Tls, host, port, pool_size, Some(acceptor)).await
    }

    async fn bind(
        kind: TransportKind,
        host: &str,
        port: u16,
        pool_size: usize,
        tls: Option<TlsAcceptor>,
    ) -> Result<Self, ListenerError> {
        if pool_size == 0 {
            return Err(ListenerError::EmptyPool(kind));
        }

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(ListenerError::Bind)?;

        let local_addr = listener
            .local_addr()
            .map_err(ListenerError::Bind)?;

        tracing::info!(
            transport = %kind,
            address = %local_addr,
            pool_size,
            "Listener bound"
        );

        Ok(Self {
            kind,
            inner: Arc::new(listener),
            tls,
            pool_size,
            tracker: ConnectionTracker::new(kind),
        })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Spawn the acceptor pool.
    pub fn start(
        self,
        dispatcher: Arc<Dispatcher>,
        settings: ConnectionSettings,
        shutdown: &Shutdown,
    ) -> Result<RunningListener, ListenerError> {
        let local_addr = self.local_addr().map_err(ListenerError::Bind)?;
        let context = Arc::new(AcceptorContext {
            kind: self.kind,
            listener: self.inner,
            tls: self.tls,
            dispatcher,
            settings,
            tracker: self.tracker.clone(),
            shutdown: shutdown.subscribe(),
        });

        let acceptors = (0..self.pool_size)
            .map(|index| {
                let context = Arc::clone(&context);
                let span = tracing::debug_span!("acceptor", transport = %context.kind, index);
                tokio::spawn(accept_loop(context).instrument(span))
            })
            .collect();

        tracing::info!(transport = %self.kind, address = %local_addr, "Started binary transport");

        Ok(RunningListener {
            kind: self.kind,
            local_addr,
            acceptors,
            tracker: self.tracker,
        })
    }
}

/// A listener whose acceptors are running.
///
/// Dropping it aborts the acceptors.
pub struct RunningListener {
    kind: TransportKind,
    local_addr: SocketAddr,
    acceptors: Vec<JoinHandle<()>>,
    tracker: ConnectionTracker,
}

impl RunningListener {
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connections currently open on this transport.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Acceptor tasks that have not exited.
    pub fn live_acceptors(&self) -> usize {
        self.acceptors.iter().filter(|handle| !handle.is_finished()).count()
    }

    /// Cancel every acceptor, including any blocked in `accept`.
    pub fn abort(&mut self) {
        for handle in self.acceptors.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for RunningListener {
    fn drop(&mut self) {
        self.abort();
    }
}

/// State shared by the acceptors of one listener.
struct AcceptorContext {
    kind: TransportKind,
    listener: Arc<TcpListener>,
    tls: Option<TlsAcceptor>,
    dispatcher: Arc<Dispatcher>,
    settings: ConnectionSettings,
    tracker: ConnectionTracker,
    shutdown: ShutdownSignal,
}

async fn accept_loop(context: Arc<AcceptorContext>) {
    let mut shutdown = context.shutdown.clone();
    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            accepted = context.listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => spawn_connection(&context, stream, peer),
            Err(e) => {
                tracing::error!(error = %ListenerError::Accept(e), "Acceptor stopped");
                return;
            }
        }
    }
    tracing::debug!("Acceptor stopped on shutdown");
}

fn spawn_connection(context: &AcceptorContext, stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(peer_addr = %peer, error = %e, "Failed to set TCP_NODELAY");
    }

    let guard = context.tracker.track();
    let span = tracing::info_span!(
        "connection",
        connection_id = %guard.id(),
        peer_addr = %peer,
        transport = %context.kind,
    );
    let tls = context.tls.clone();
    let dispatcher = Arc::clone(&context.dispatcher);
    let settings = context.settings;
    let mut shutdown = context.shutdown.clone();

    tokio::spawn(
        async move {
            tracing::debug!("Connection accepted");
            let result = match tls {
                None => {
                    Connection::new(stream, peer, guard, dispatcher, settings)
                        .run(&mut shutdown)
                        .await
                }
                Some(acceptor) => {
                    let handshake = tokio::select! {
                        biased;
                        _ = shutdown.recv() => return,
                        handshake = acceptor.accept(stream) => handshake,
                    };
                    match handshake {
                        Ok(tls_stream) => {
                            Connection::new(tls_stream, peer, guard, dispatcher, settings)
                                .run(&mut shutdown)
                                .await
                        }
                        Err(e) => Err(ConnectionError::Handshake(e)),
                    }
                }
            };

            match result {
                Ok(()) => tracing::debug!("Connection finished"),
                Err(ConnectionError::Framing(e)) => {
                    metrics::record_framing_error(e.kind());
                    tracing::warn!(error = %e, "Closing connection after framing error");
                }
                Err(e) => tracing::warn!(error = %e, "Connection terminated"),
            }
        }
        .instrument(span),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChannelPipeline, InMemorySessionBackend};
    use crate::protocol::{read_response, CommandType, Frame, LoginRequest, Response};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn dispatcher() -> Arc<Dispatcher> {
        let sessions = InMemorySessionBackend::new([("bob", "pwd")]);
        let (pipeline, _rx) = ChannelPipeline::new(sessions.clone());
        Arc::new(Dispatcher::new(Arc::new(sessions), Arc::new(pipeline)))
    }

    #[tokio::test]
    async fn runs_one_acceptor_per_pool_slot() {
        let listener = TransportListener::bind_tcp("127.0.0.1", 0, 3).await.unwrap();
        assert_eq!(listener.kind(), TransportKind::Tcp);
        let shutdown = Shutdown::new();
        let running = listener
            .start(dispatcher(), ConnectionSettings::default(), &shutdown)
            .unwrap();
        assert_eq!(running.live_acceptors(), 3);
        assert_ne!(running.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn zero_pool_is_rejected() {
        let err = TransportListener::bind_tcp("127.0.0.1", 0, 0).await.err().unwrap();
        assert!(matches!(err, ListenerError::EmptyPool(TransportKind::Tcp)));
        assert_eq!(err.to_string(), "tcp pool_size must be at least 1");
    }

    #[tokio::test]
    async fn single_acceptor_serves_connections() {
        let listener = TransportListener::bind_tcp("127.0.0.1", 0, 1).await.unwrap();
        let shutdown = Shutdown::new();
        let running = listener
            .start(dispatcher(), ConnectionSettings::default(), &shutdown)
            .unwrap();
        assert_eq!(running.live_acceptors(), 1);

        let mut stream = TcpStream::connect(running.local_addr()).await.unwrap();
        let login = Frame::new(CommandType::Login, LoginRequest::new("bob", "pwd").encode());
        stream.write_all(&login.encode()).await.unwrap();
        assert!(matches!(read_response(&mut stream).await.unwrap(), Response::LoginAck { .. }));
        assert_eq!(running.active_connections(), 1);
    }

    #[tokio::test]
    async fn shutdown_ends_acceptors() {
        let listener = TransportListener::bind_tcp("127.0.0.1", 0, 2).await.unwrap();
        let shutdown = Shutdown::new();
        let running = listener
            .start(dispatcher(), ConnectionSettings::default(), &shutdown)
            .unwrap();

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), async {
            while running.live_acceptors() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn transport_labels() {
        assert_eq!(TransportKind::Tcp.to_string(), "tcp");
        assert_eq!(TransportKind::Tls.as_str(), "tls");
    }
}

//! Receiver service: owns both transports.
//!
//! # Responsibilities
//! - Resolve TLS material and bind both listening sockets
//! - Start the acceptor pools with the configured sizes
//! - Hard-stop everything on request
//!
//! # Design Decisions
//! - TLS is prepared first and both sockets are bound before any acceptor
//!   runs, so a TLS startup failure aborts the whole start
//! - `tls.enabled = false` is the supported way to run plaintext only
//! - Stop does not drain connections

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ReceiverConfig;
use crate::dispatch::Dispatcher;
use crate::lifecycle::Shutdown;
use crate::net::{
    load_tls_acceptor, ConnectionSettings, ListenerError, RunningListener, StartupError,
    TlsIdentity, TransportListener,
};

/// Errors from starting the receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("receiver is already running")]
    AlreadyRunning,
}

struct Running {
    shutdown: Shutdown,
    tcp: RunningListener,
    tls: Option<RunningListener>,
}

/// The binary protocol receiver.
pub struct BinaryReceiver {
    config: ReceiverConfig,
    dispatcher: Arc<Dispatcher>,
    running: Option<Running>,
}

impl BinaryReceiver {
    pub fn new(config: ReceiverConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            running: None,
        }
    }

    /// Bind both transports and start accepting.
    pub async fn start(&mut self) -> Result<(), ReceiverError> {
        if self.running.is_some() {
            return Err(ReceiverError::AlreadyRunning);
        }

        let settings = ConnectionSettings::from(&self.config.connection);

        let tls = if self.config.tls.enabled {
            let identity = TlsIdentity::resolve(&self.config.tls)?;
            let acceptor = load_tls_acceptor(&identity)?;
            let listener = TransportListener::bind_tls(
                &self.config.tls.host,
                self.config.tls.port,
                self.config.tls.pool_size,
                acceptor,
            )
            .await?;
            Some(listener)
        } else {
            tracing::info!("TLS transport disabled");
            None
        };

        let tcp = TransportListener::bind_tcp(
            &self.config.tcp.host,
            self.config.tcp.port,
            self.config.tcp.pool_size,
        )
        .await?;

        let shutdown = Shutdown::new();
        let tls = tls
            .map(|listener| listener.start(Arc::clone(&self.dispatcher), settings, &shutdown))
            .transpose()?;
        let tcp = tcp.start(Arc::clone(&self.dispatcher), settings, &shutdown)?;

        self.running = Some(Running { shutdown, tcp, tls });
        Ok(())
    }

    /// Stop accepting and close every connection without draining.
    pub fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.shutdown.trigger();
            running.tcp.abort();
            if let Some(tls) = running.tls.as_mut() {
                tls.abort();
            }
            tracing::info!("Binary receiver stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address of the plaintext transport while running.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.tcp.local_addr())
    }

    /// Address of the TLS transport while running with TLS enabled.
    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.running
            .as_ref()
            .and_then(|running| running.tls.as_ref())
            .map(RunningListener::local_addr)
    }

    /// Open connections across both transports.
    pub fn active_connections(&self) -> u64 {
        self.running.as_ref().map_or(0, |running| {
            running.tcp.active_connections()
                + running.tls.as_ref().map_or(0, RunningListener::active_connections)
        })
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

impl Drop for BinaryReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

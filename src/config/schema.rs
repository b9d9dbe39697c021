//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the receiver.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the binary receiver.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Plaintext TCP transport.
    pub tcp: TcpTransportConfig,

    /// TLS transport.
    pub tls: TlsTransportConfig,

    /// Per-connection limits.
    pub connection: ConnectionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Credentials for the built-in session backend.
    pub auth: AuthConfig,
}

/// Plaintext transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpTransportConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind. 0 picks an ephemeral port.
    pub port: u16,

    /// Number of acceptor tasks sharing the listening socket.
    pub pool_size: usize,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9611,
            pool_size: 100,
        }
    }
}

/// TLS transport configuration.
///
/// `cert_path` and `key_path` fall back to the `RECEIVER_TLS_CERT_PATH` and
/// `RECEIVER_TLS_KEY_PATH` environment variables when unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsTransportConfig {
    /// Start the TLS transport.
    pub enabled: bool,

    /// Interface to bind.
    pub host: String,

    /// Port to bind. 0 picks an ephemeral port.
    pub port: u16,

    /// Number of acceptor tasks sharing the listening socket.
    pub pool_size: usize,

    /// Certificate chain (PEM).
    pub cert_path: Option<PathBuf>,

    /// Private key (PEM).
    pub key_path: Option<PathBuf>,
}

impl Default for TlsTransportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 9711,
            pool_size: 100,
            cert_path: None,
            key_path: None,
        }
    }
}

/// Per-connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Close a connection that sends nothing for this long. Unset means never.
    pub idle_timeout_secs: Option<u64>,

    /// Largest payload a frame may declare.
    pub max_payload_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: None,
            max_payload_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Built-in session backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted agent credentials.
    pub users: Vec<UserCredentials>,

    /// Session lifetime in seconds. Unset means sessions live until logout.
    pub session_timeout_secs: Option<u64>,
}

/// One accepted username/password pair.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

//! TLS configuration and certificate loading.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsTransportConfig;

/// Fallback source for the certificate chain path.
pub const CERT_PATH_ENV: &str = "RECEIVER_TLS_CERT_PATH";
/// Fallback source for the private key path.
pub const KEY_PATH_ENV: &str = "RECEIVER_TLS_KEY_PATH";

/// Reasons the TLS transport cannot start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot start TLS transport: tls.{setting} is not configured and {env} is not set")]
    MissingSetting {
        setting: &'static str,
        env: &'static str,
    },

    #[error("{kind} file not found: {path:?}")]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),

    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
}

/// Where the server certificate chain and key live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsIdentity {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl TlsIdentity {
    /// Resolve from config, falling back to the process environment.
    pub fn resolve(config: &TlsTransportConfig) -> Result<Self, StartupError> {
        Self::resolve_with(config, |name| std::env::var_os(name))
    }

    /// Resolve from config, falling back to `lookup` for unset values.
    pub fn resolve_with<F>(config: &TlsTransportConfig, lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let cert_path = config
            .cert_path
            .clone()
            .or_else(|| lookup(CERT_PATH_ENV).map(PathBuf::from))
            .ok_or(StartupError::MissingSetting {
                setting: "cert_path",
                env: CERT_PATH_ENV,
            })?;
        let key_path = config
            .key_path
            .clone()
            .or_else(|| lookup(KEY_PATH_ENV).map(PathBuf::from))
            .ok_or(StartupError::MissingSetting {
                setting: "key_path",
                env: KEY_PATH_ENV,
            })?;
        Ok(Self {
            cert_path,
            key_path,
        })
    }
}

/// Build a TLS acceptor from PEM certificate and key files.
///
/// Every cipher suite and protocol version of the ring provider is enabled,
/// favouring compatibility with older agents.
pub fn load_tls_acceptor(identity: &TlsIdentity) -> Result<TlsAcceptor, StartupError> {
    let certs = load_certs(&identity.cert_path)?;
    let key = load_private_key(&identity.key_path)?;

    let provider = CryptoProvider {
        cipher_suites: ring::ALL_CIPHER_SUITES.to_vec(),
        ..ring::default_provider()
    };
    let config = ServerConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(rustls::ALL_VERSIONS)?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    tracing::debug!(
        cert_path = ?identity.cert_path,
        cipher_suites = ring::ALL_CIPHER_SUITES.len(),
        "TLS configuration loaded"
    );
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path, kind: &'static str) -> Result<BufReader<File>, StartupError> {
    if !path.exists() {
        return Err(StartupError::NotFound {
            kind,
            path: path.to_path_buf(),
        });
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, StartupError> {
    let mut reader = open(path, "Certificate")?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(StartupError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, StartupError> {
    let mut reader = open(path, "Private key")?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| StartupError::NoPrivateKey(path.to_path_buf()))
}

//! End-to-end tests over the TLS transport.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use binary_receiver::protocol::{CommandType, Response};
use common::*;

fn tls_config(identity: &TestIdentity) -> binary_receiver::ReceiverConfig {
    let mut config = plaintext_config();
    config.tls.enabled = true;
    config.tls.cert_path = Some(identity.cert_path.clone());
    config.tls.key_path = Some(identity.key_path.clone());
    config
}

async fn connect_tls(addr: SocketAddr, identity: &TestIdentity) -> TlsStream<TcpStream> {
    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(identity.cert_der.clone())).unwrap();
    let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let tcp = TcpStream::connect(addr).await.unwrap();
    TlsConnector::from(Arc::new(config))
        .connect(ServerName::try_from("localhost").unwrap(), tcp)
        .await
        .expect("TLS handshake failed")
}

#[tokio::test]
async fn login_and_publish_over_tls() {
    let identity = write_identity();
    let mut test = start_receiver(tls_config(&identity)).await;
    let addr = test.receiver.tls_addr().expect("TLS transport not running");
    assert_ne!(Some(addr), test.receiver.tcp_addr());

    let mut stream = connect_tls(addr, &identity).await;
    let session_id = login(&mut stream, "bob", "pwd").await;

    let payload = publish_payload(&session_id, &[("cpu:1.0.0", 42, b"\x07")]);
    assert_eq!(round_trip(&mut stream, CommandType::Publish, payload).await, Response::SimpleAck);

    let batch = test.batches.recv().await.unwrap();
    assert_eq!(batch.events[0].timestamp, 42);
}

#[tokio::test]
async fn both_transports_share_sessions() {
    let identity = write_identity();
    let test = start_receiver(tls_config(&identity)).await;

    let mut tls = connect_tls(test.receiver.tls_addr().unwrap(), &identity).await;
    let session_id = login(&mut tls, "alice", "secret").await;

    let mut plain = connect(test.tcp_addr()).await;
    let response = round_trip(&mut plain, CommandType::Logout, session_payload(&session_id)).await;
    assert_eq!(response, Response::SimpleAck);
}

#[tokio::test]
async fn plaintext_client_on_tls_port_is_dropped() {
    let identity = write_identity();
    let test = start_receiver(tls_config(&identity)).await;

    let mut stream = connect(test.receiver.tls_addr().unwrap()).await;
    stream.write_all(&[0, 0, 0, 0, 0]).await.unwrap();
    expect_closed(&mut stream).await;

    // The TLS transport keeps accepting.
    let mut tls = connect_tls(test.receiver.tls_addr().unwrap(), &identity).await;
    login(&mut tls, "bob", "pwd").await;
}

#[tokio::test]
async fn stop_closes_tls_connections() {
    let identity = write_identity();
    let mut test = start_receiver(tls_config(&identity)).await;

    let mut tls = connect_tls(test.receiver.tls_addr().unwrap(), &identity).await;
    login(&mut tls, "bob", "pwd").await;

    test.receiver.stop();
    assert!(test.receiver.tls_addr().is_none());
    expect_closed(&mut tls).await;
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

use binary_receiver::backend::{ChannelPipeline, EventBatch, InMemorySessionBackend};
use binary_receiver::config::{ReceiverConfig, UserCredentials};
use binary_receiver::protocol::{read_response, CommandType, Frame, LoginRequest, Response};
use binary_receiver::{BinaryReceiver, Dispatcher};

/// How long to wait before deciding the receiver sent nothing.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// A running receiver with in-memory collaborators.
pub struct TestReceiver {
    pub receiver: BinaryReceiver,
    pub sessions: InMemorySessionBackend,
    pub batches: UnboundedReceiver<EventBatch>,
}

impl TestReceiver {
    pub fn tcp_addr(&self) -> SocketAddr {
        self.receiver.tcp_addr().expect("receiver not running")
    }
}

/// Plaintext-only config on ephemeral loopback ports with user bob/pwd.
pub fn plaintext_config() -> ReceiverConfig {
    let mut config = ReceiverConfig::default();
    config.tcp.host = "127.0.0.1".to_string();
    config.tcp.port = 0;
    config.tcp.pool_size = 4;
    config.tls.enabled = false;
    config.tls.host = "127.0.0.1".to_string();
    config.tls.port = 0;
    config.tls.pool_size = 2;
    config.auth.users = vec![
        UserCredentials {
            username: "bob".to_string(),
            password: "pwd".to_string(),
        },
        UserCredentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        },
    ];
    config
}

/// Build a receiver over the in-memory backend without starting it.
pub fn build_receiver(config: ReceiverConfig) -> TestReceiver {
    let sessions = InMemorySessionBackend::from_config(&config.auth);
    let (pipeline, batches) = ChannelPipeline::new(sessions.clone());
    let dispatcher = Dispatcher::new(Arc::new(sessions.clone()), Arc::new(pipeline));
    TestReceiver {
        receiver: BinaryReceiver::new(config, dispatcher),
        sessions,
        batches,
    }
}

/// Build and start a receiver.
pub async fn start_receiver(config: ReceiverConfig) -> TestReceiver {
    let mut test = build_receiver(config);
    test.receiver.start().await.expect("receiver failed to start");
    test
}

pub async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect failed")
}

pub async fn send_frame<S>(stream: &mut S, frame: &Frame)
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&frame.encode()).await.unwrap();
    stream.flush().await.unwrap();
}

/// Send one frame and read one response.
pub async fn round_trip<S>(stream: &mut S, command: CommandType, payload: impl Into<Bytes>) -> Response
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    send_frame(stream, &Frame::new(command, payload)).await;
    tokio::time::timeout(Duration::from_secs(5), read_response(stream))
        .await
        .expect("timed out waiting for response")
        .expect("failed to read response")
}

/// Log in and return the issued session id.
pub async fn login<S>(stream: &mut S, username: &str, password: &str) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match round_trip(stream, CommandType::Login, LoginRequest::new(username, password).encode()).await {
        Response::LoginAck { session_id } => session_id,
        other => panic!("expected login ack, got {:?}", other),
    }
}

/// Publish payload: session prefix, then events in the binary event layout.
pub fn publish_payload(session_id: &str, events: &[(&str, i64, &[u8])]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32(session_id.len() as u32);
    buf.put_slice(session_id.as_bytes());
    buf.put_u32(events.len() as u32);
    for (stream_id, timestamp, attributes) in events {
        buf.put_i64(*timestamp);
        buf.put_u32(stream_id.len() as u32);
        buf.put_slice(stream_id.as_bytes());
        buf.put_u32(attributes.len() as u32);
        buf.put_slice(attributes);
    }
    buf.freeze()
}

/// Logout payload: the session prefix alone.
pub fn session_payload(session_id: &str) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32(session_id.len() as u32);
    buf.put_slice(session_id.as_bytes());
    buf.freeze()
}

/// Assert the peer closes the stream without sending anything further.
pub async fn expect_closed<S>(stream: &mut S)
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("connection was not closed");
    match read {
        Ok(n) => assert_eq!(n, 0, "expected EOF, got {:?}", &buf[..n]),
        // A reset also counts as closed.
        Err(_) => {}
    }
}

/// Assert nothing arrives within the quiet period.
pub async fn expect_silence<S>(stream: &mut S)
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 16];
    if let Ok(read) = tokio::time::timeout(QUIET_PERIOD, stream.read(&mut buf)).await {
        panic!("expected no bytes, got {:?}", read.map(|n| buf[..n].to_vec()));
    }
}

/// Self-signed localhost certificate and key written to a fresh temp dir.
pub struct TestIdentity {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub cert_der: Vec<u8>,
}

pub fn write_identity() -> TestIdentity {
    let dir = std::env::temp_dir().join(format!("receiver-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let identity = TestIdentity {
        cert_path: dir.join("cert.pem"),
        key_path: dir.join("key.pem"),
        cert_der: certified.cert.der().to_vec(),
    };
    std::fs::write(&identity.cert_path, certified.cert.pem()).unwrap();
    std::fs::write(&identity.key_path, certified.key_pair.serialize_pem()).unwrap();
    identity
}

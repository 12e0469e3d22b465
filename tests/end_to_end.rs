//! End-to-end transfers through a real server on loopback

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use media_transfer::config::{ClientConfig, TransferConfig, TransportKind};
use media_transfer::core::frame::{FrameLimits, TransferFrame};
use media_transfer::error::TransferError;
use media_transfer::protocol::status::TransferStatus;
use media_transfer::service::{TransferClient, TransferServer};
use media_transfer::transport::datagram::DatagramChannel;
use media_transfer::transport::stream::StreamChannel;
use media_transfer::utils::metrics::Metrics;
use tokio::sync::mpsc;

struct Harness {
    tcp_port: u16,
    udp_port: u16,
    metrics: Arc<Metrics>,
    shutdown: mpsc::Sender<()>,
    server: tokio::task::JoinHandle<media_transfer::Result<()>>,
}

impl Harness {
    async fn start(root: &Path) -> Self {
        let config = TransferConfig::default_with_overrides(|c| {
            c.server.host = "127.0.0.1".into();
            c.server.tcp_port = 0;
            c.server.udp_port = 0;
            c.storage.root = root.to_path_buf();
        });

        let server = TransferServer::bind(&config).await.unwrap();
        let tcp_port = server.tcp_addr().unwrap().port();
        let udp_port = server.udp_addr().unwrap().port();
        let metrics = server.metrics();

        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let server = tokio::spawn(server.run_with_shutdown(shutdown_rx));

        Self {
            tcp_port,
            udp_port,
            metrics,
            shutdown,
            server,
        }
    }

    fn client(&self, transport: TransportKind, chunk_size: usize) -> TransferClient {
        let port = match transport {
            TransportKind::Tcp => self.tcp_port,
            TransportKind::Udp => self.udp_port,
        };
        let config = ClientConfig {
            host: "127.0.0.1".into(),
            port,
            transport,
            response_timeout: Some(Duration::from_secs(10)),
        };
        TransferClient::new(&config, chunk_size)
    }

    async fn stop(self) {
        self.shutdown.send(()).await.unwrap();
        self.server.await.unwrap().unwrap();
    }
}

fn write_source(dir: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn count_files(root: &Path) -> usize {
    let mut count = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                count += 1;
            }
        }
    }
    count
}

#[tokio::test]
async fn test_empty_text_file_over_tcp() {
    let storage = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;

    let source = write_source(sources.path(), "empty.txt", b"");
    let report = harness
        .client(TransportKind::Tcp, 1024)
        .send_file(&source)
        .await
        .unwrap();
    assert_eq!(report.bytes, 0);
    assert_eq!(report.chunks, None);

    let stored = storage.path().join("Multimedia/Texts/empty.txt");
    assert!(stored.is_file());
    assert_eq!(std::fs::metadata(&stored).unwrap().len(), 0);

    harness.stop().await;
}

#[tokio::test]
async fn test_photo_over_udp_in_five_chunks() {
    let storage = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;

    let contents: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    let source = write_source(sources.path(), "photo.png", &contents);
    let report = harness
        .client(TransportKind::Udp, 1024)
        .send_file(&source)
        .await
        .unwrap();
    assert_eq!(report.chunks, Some(5));

    let stored = storage.path().join("Multimedia/Images/photo.png");
    assert_eq!(std::fs::read(&stored).unwrap(), contents);

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.chunks_received, 5);
    assert_eq!(snapshot.transfers_succeeded, 1);
    assert_eq!(snapshot.bytes_received, 5000);

    harness.stop().await;
}

#[tokio::test]
async fn test_unknown_extension_rejected_on_both_transports() {
    let storage = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;
    let source = write_source(sources.path(), "setup.exe", b"MZ\x90\x00");

    for transport in [TransportKind::Tcp, TransportKind::Udp] {
        let err = harness
            .client(transport, 1024)
            .send_file(&source)
            .await
            .unwrap_err();
        assert!(
            matches!(err, TransferError::Rejected(0)),
            "{transport}: unexpected {err:?}"
        );
    }

    assert_eq!(count_files(storage.path()), 0);
    assert_eq!(harness.metrics.snapshot().classification_errors, 2);

    harness.stop().await;
}

#[tokio::test]
async fn test_corrupted_payload_rejected() {
    let storage = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;

    let good = TransferFrame::new("song.mp3", vec![0x33; 2048]);
    let (name, payload, digest) = good.into_parts();
    let mut bytes = payload.to_vec();
    bytes[1000] ^= 0x80;
    let corrupted = TransferFrame::from_parts(name, bytes, digest);

    let mut channel = StreamChannel::connect(("127.0.0.1", harness.tcp_port), FrameLimits::default())
        .await
        .unwrap();
    channel.send_frame(&corrupted).await.unwrap();
    assert_eq!(channel.recv_status().await.unwrap(), TransferStatus::Failure);

    assert!(!storage.path().join("Multimedia/Audios/song.mp3").exists());
    assert_eq!(count_files(storage.path()), 0);
    assert_eq!(harness.metrics.snapshot().integrity_errors, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_resend_overwrites() {
    let storage = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;
    let client = harness.client(TransportKind::Tcp, 1024);

    let source = write_source(sources.path(), "notes.txt", b"first draft, longer");
    client.send_file(&source).await.unwrap();
    let source = write_source(sources.path(), "notes.txt", b"final");
    client.send_file(&source).await.unwrap();

    let stored = storage.path().join("Multimedia/Texts/notes.txt");
    assert_eq!(std::fs::read(stored).unwrap(), b"final");

    harness.stop().await;
}

#[tokio::test]
async fn test_server_survives_garbage_connection() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let storage = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;

    let mut raw = tokio::net::TcpStream::connect(("127.0.0.1", harness.tcp_port))
        .await
        .unwrap();
    raw.write_all(b"\x07garbage").await.unwrap();
    let mut reply = [0u8; 1];
    raw.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[0], 0);

    let source = write_source(sources.path(), "pic.jpeg", b"\xFF\xD8\xFF");
    harness
        .client(TransportKind::Tcp, 1024)
        .send_file(&source)
        .await
        .unwrap();
    assert!(storage.path().join("Multimedia/Images/pic.jpeg").is_file());

    harness.stop().await;
}

#[tokio::test]
async fn test_udp_failure_then_success() {
    let storage = tempfile::tempdir().unwrap();
    let sources = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;
    let client = harness.client(TransportKind::Udp, 256);

    let bad = write_source(sources.path(), "x.exe", &[0x4D; 700]);
    let err = client.send_file(&bad).await.unwrap_err();
    assert!(matches!(err, TransferError::Rejected(0)), "unexpected {err:?}");

    let contents: Vec<u8> = (0..1500u32).map(|i| (i * 7 % 256) as u8).collect();
    let good = write_source(sources.path(), "y.png", &contents);
    let report = client.send_file(&good).await.unwrap();
    assert_eq!(report.chunks, Some(6));

    let stored = storage.path().join("Multimedia/Images/y.png");
    assert_eq!(std::fs::read(stored).unwrap(), contents);
    assert_eq!(count_files(storage.path()), 1);

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.transfers_failed, 1);
    assert_eq!(snapshot.transfers_succeeded, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_corrupted_payload_over_udp_writes_nothing() {
    let storage = tempfile::tempdir().unwrap();
    let harness = Harness::start(storage.path()).await;

    let good = TransferFrame::new("take.mov", vec![0x5A; 3000]);
    let (name, payload, digest) = good.into_parts();
    let mut bytes = payload.to_vec();
    bytes[2999] ^= 0x01;
    let corrupted = TransferFrame::from_parts(name, bytes, digest);

    let target: std::net::SocketAddr = ([127, 0, 0, 1], harness.udp_port).into();
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let channel = DatagramChannel::new(socket, 1024, FrameLimits::default());
    channel.send_frame(&corrupted, target).await.unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), channel.recv_status(target))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, TransferStatus::Failure);

    assert_eq!(count_files(storage.path()), 0);
    assert_eq!(harness.metrics.snapshot().integrity_errors, 1);

    harness.stop().await;
}

#[tokio::test]
async fn test_udp_send_to_closed_port_fails() {
    let sources = tempfile::tempdir().unwrap();
    let source = write_source(sources.path(), "photo.png", &[0x89; 3000]);

    // Bind and release a port so nothing is listening on it
    let port = {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap().port()
    };
    let config = ClientConfig {
        host: "127.0.0.1".into(),
        port,
        transport: TransportKind::Tcp,
        response_timeout: Some(Duration::from_secs(1)),
    };
    let client = TransferClient::new(&config, 1024)
        .with_transport(TransportKind::Udp)
        .with_response_timeout(None);

    let result = tokio::time::timeout(Duration::from_secs(5), client.send_file(&source))
        .await
        .expect("sender blocked waiting for a reply that cannot come");
    assert!(
        matches!(result, Err(TransferError::Io(_))),
        "unexpected {result:?}"
    );
}

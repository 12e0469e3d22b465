//! Datagram channel behaviour against an in-memory socket
//!
//! The double records what the sender emits and replays datagrams to the
//! receiver, so chunk boundaries, ordering and foreign traffic are exact.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;

use media_transfer::core::frame::{FrameLimits, TransferFrame, START_MARKER};
use media_transfer::error::TransferError;
use media_transfer::protocol::status::TransferStatus;
use media_transfer::transport::datagram::{DatagramChannel, DatagramSocket};

fn sender_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 40000))
}

fn receiver_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 2], 8000))
}

fn stranger_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 9], 50000))
}

/// Socket that records every send and replays a fixed list of datagrams
#[derive(Default)]
struct ScriptedSocket {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    inbox: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
}

impl ScriptedSocket {
    fn with_inbox(datagrams: Vec<(Vec<u8>, SocketAddr)>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            inbox: Mutex::new(datagrams.into()),
        }
    }

    fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }
}

impl DatagramSocket for ScriptedSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.sent.lock().unwrap().push((buf.to_vec(), target));
        Ok(buf.len())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let next = self.inbox.lock().unwrap().pop_front();
        match next {
            Some((data, from)) => {
                buf[..data.len()].copy_from_slice(&data);
                Ok((data.len(), from))
            }
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "inbox empty")),
        }
    }
}

/// Payloads of the datagrams a sender emits for `frame`
async fn emitted(frame: &TransferFrame, chunk_size: usize) -> Vec<Vec<u8>> {
    let channel = DatagramChannel::new(ScriptedSocket::default(), chunk_size, FrameLimits::default());
    channel.send_frame(frame, receiver_addr()).await.unwrap();
    channel
        .socket()
        .sent()
        .into_iter()
        .map(|(data, target)| {
            assert_eq!(target, receiver_addr());
            data
        })
        .collect()
}

fn from_sender(datagrams: Vec<Vec<u8>>) -> Vec<(Vec<u8>, SocketAddr)> {
    datagrams.into_iter().map(|d| (d, sender_addr())).collect()
}

fn receiver(inbox: Vec<(Vec<u8>, SocketAddr)>, chunk_size: usize) -> DatagramChannel<ScriptedSocket> {
    DatagramChannel::new(
        ScriptedSocket::with_inbox(inbox),
        chunk_size,
        FrameLimits::default(),
    )
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

#[tokio::test]
async fn test_send_order_and_sizes() {
    let frame = TransferFrame::new("photo.png", patterned(5000));
    let datagrams = emitted(&frame, 1024).await;

    // marker, name len, name, payload len, 5 chunks, digest
    assert_eq!(datagrams.len(), 10);
    assert_eq!(datagrams[0], vec![START_MARKER]);
    assert_eq!(datagrams[1], 9u32.to_be_bytes());
    assert_eq!(datagrams[2], b"photo.png");
    assert_eq!(datagrams[3], 5000u32.to_be_bytes());

    let chunk_lens: Vec<usize> = datagrams[4..9].iter().map(Vec::len).collect();
    assert_eq!(chunk_lens, [1024, 1024, 1024, 1024, 904]);
    assert_eq!(datagrams[4..9].concat(), frame.payload());
    assert_eq!(&datagrams[9][..], frame.digest().as_bytes());
}

#[tokio::test]
async fn test_empty_payload_sends_no_chunks() {
    let frame = TransferFrame::new("empty.txt", Vec::new());
    let datagrams = emitted(&frame, 1024).await;
    assert_eq!(datagrams.len(), 5);
    assert_eq!(datagrams[3], 0u32.to_be_bytes());
    assert_eq!(datagrams[4].len(), 32);
}

#[tokio::test]
async fn test_exact_multiple_of_chunk_size() {
    let frame = TransferFrame::new("a.wav", patterned(2048));
    let datagrams = emitted(&frame, 1024).await;
    let chunk_lens: Vec<usize> = datagrams[4..datagrams.len() - 1].iter().map(Vec::len).collect();
    assert_eq!(chunk_lens, [1024, 1024]);
}

#[tokio::test]
async fn test_receive_reassembles_and_pins_peer() {
    let frame = TransferFrame::new("photo.png", patterned(5000));
    let channel = receiver(from_sender(emitted(&frame, 1024).await), 1024);

    let mut reader = channel.accept().await.unwrap();
    assert_eq!(reader.peer(), sender_addr());

    let received = channel.read_frame(&mut reader).await.unwrap();
    assert_eq!(received.frame, frame);
    assert_eq!(received.chunk_reads, 5);
    assert!(received.frame.verify().is_ok());

    channel
        .send_status(TransferStatus::Success, reader.peer())
        .await
        .unwrap();
    assert_eq!(channel.socket().sent(), vec![(vec![1u8], sender_addr())]);
}

#[tokio::test]
async fn test_coalesced_datagrams_still_decode() {
    let frame = TransferFrame::new("clip.mp4", patterned(3000));
    let whole = frame.to_bytes().unwrap().to_vec();
    let (head, tail) = whole.split_at(7);
    let channel = receiver(from_sender(vec![head.to_vec(), tail.to_vec()]), 1024);

    let mut reader = channel.accept().await.unwrap();
    let received = channel.read_frame(&mut reader).await.unwrap();
    assert_eq!(received.frame, frame);
    assert_eq!(received.chunk_reads, 3);
}

#[tokio::test]
async fn test_foreign_datagrams_dropped() {
    let frame = TransferFrame::new("tone.mid", patterned(1500));
    let mut inbox = from_sender(emitted(&frame, 512).await);
    inbox.insert(3, (vec![0xEE; 16], stranger_addr()));
    inbox.insert(6, (vec![0xEE; 600], stranger_addr()));
    let channel = receiver(inbox, 512);

    let mut reader = channel.accept().await.unwrap();
    let received = channel.read_frame(&mut reader).await.unwrap();
    assert_eq!(received.frame, frame);
    assert_eq!(reader.dropped(), 2);
}

#[tokio::test]
async fn test_reordered_chunks_fail_digest() {
    let frame = TransferFrame::new("photo.jpg", patterned(3000));
    let mut datagrams = emitted(&frame, 1024).await;
    datagrams.swap(4, 5);
    let channel = receiver(from_sender(datagrams), 1024);

    let mut reader = channel.accept().await.unwrap();
    let received = channel.read_frame(&mut reader).await.unwrap();
    assert_eq!(received.frame.payload().len(), 3000);
    assert!(matches!(
        received.frame.verify(),
        Err(TransferError::IntegrityMismatch { .. })
    ));
}

#[tokio::test]
async fn test_lost_digest_is_io_error() {
    let frame = TransferFrame::new("photo.jpg", patterned(100));
    let mut datagrams = emitted(&frame, 1024).await;
    datagrams.pop();
    let channel = receiver(from_sender(datagrams), 1024);

    let mut reader = channel.accept().await.unwrap();
    assert!(matches!(
        channel.read_frame(&mut reader).await,
        Err(TransferError::Io(_))
    ));
}

#[tokio::test]
async fn test_bad_marker_rejected() {
    let channel = receiver(from_sender(vec![vec![0x42]]), 1024);
    let mut reader = channel.accept().await.unwrap();
    assert!(matches!(
        channel.read_frame(&mut reader).await,
        Err(TransferError::InvalidStartMarker(0x42))
    ));
}

#[tokio::test]
async fn test_sender_ignores_status_from_stranger() {
    let socket = ScriptedSocket::with_inbox(vec![
        (vec![1], stranger_addr()),
        (vec![0], receiver_addr()),
    ]);
    let channel = DatagramChannel::new(socket, 1024, FrameLimits::default());
    assert_eq!(
        channel.recv_status(receiver_addr()).await.unwrap(),
        TransferStatus::Failure
    );
}

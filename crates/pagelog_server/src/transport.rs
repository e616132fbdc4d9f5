//! Outbound side of a client connection.
//!
//! A [`Transport`] never blocks: a frame is either accepted, refused because
//! the peer is slow ([`SendStatus::Backpressure`]), or refused because the
//! connection is gone ([`SendStatus::Dropped`]). Refused frames stay with the
//! session and are retried on drain or reattachment. Frames a
//! [`ChannelTransport`] accepted but never wrote are handed back to the
//! session when the connection closes.

use pagelog_protocol::ServerMessage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    /// Allocates a fresh id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Outcome of a non-blocking send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The frame was queued for writing.
    Sent,
    /// The peer is not keeping up; try again after drain.
    Backpressure,
    /// The connection is closed.
    Dropped,
}

/// An incoming frame, as delivered by the connection reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A binary frame.
    Binary(Vec<u8>),
    /// A text frame.
    Text(String),
}

/// A connection to one client.
pub trait Transport: Send + Sync {
    /// Identity of this connection.
    fn id(&self) -> TransportId;

    /// Hands a frame to the connection without blocking.
    fn send(&self, frame: Vec<u8>) -> SendStatus;
}

/// Transport backed by a bounded channel drained by a writer task.
#[derive(Debug)]
pub struct ChannelTransport {
    id: TransportId,
    tx: mpsc::Sender<Vec<u8>>,
    congested: Arc<AtomicBool>,
}

/// Receiving half of a [`ChannelTransport`], owned by the writer task.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Vec<u8>>,
    congested: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Creates a transport whose channel holds up to `capacity` frames.
    pub fn new(capacity: usize) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let congested = Arc::new(AtomicBool::new(false));
        let transport = Self {
            id: TransportId::next(),
            tx,
            congested: Arc::clone(&congested),
        };
        (transport, OutboundQueue { rx, congested })
    }
}

impl Transport for ChannelTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn send(&self, frame: Vec<u8>) -> SendStatus {
        match self.tx.try_send(frame) {
            Ok(()) => SendStatus::Sent,
            Err(TrySendError::Full(_)) => {
                self.congested.store(true, Ordering::Release);
                SendStatus::Backpressure
            }
            Err(TrySendError::Closed(_)) => SendStatus::Dropped,
        }
    }
}

impl OutboundQueue {
    /// Waits for the next frame. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Returns true once after a send hit a full channel.
    pub fn take_congestion(&self) -> bool {
        self.congested.swap(false, Ordering::AcqRel)
    }

    /// Closes the channel and returns the frames never handed to the
    /// socket, oldest first. Later sends report [`SendStatus::Dropped`].
    pub fn close_and_drain(&mut self) -> Vec<Vec<u8>> {
        self.rx.close();
        let mut unsent = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            unsent.push(frame);
        }
        unsent
    }
}

/// In-memory transport for tests.
#[derive(Debug)]
pub struct MemoryTransport {
    id: TransportId,
    frames: Mutex<Vec<Vec<u8>>>,
    status: Mutex<SendStatus>,
}

impl MemoryTransport {
    /// Creates a transport that accepts every frame.
    pub fn new() -> Self {
        Self {
            id: TransportId::next(),
            frames: Mutex::new(Vec::new()),
            status: Mutex::new(SendStatus::Sent),
        }
    }

    /// Sets the status returned by subsequent sends. Frames are recorded
    /// only while the status is [`SendStatus::Sent`].
    pub fn set_status(&self, status: SendStatus) {
        *self.status.lock() = status;
    }

    /// Number of accepted frames.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Returns true if no frame was accepted.
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Removes and returns the accepted frames.
    pub fn take_frames(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.frames.lock())
    }

    /// Removes the accepted frames and decodes them. Frames that do not
    /// decode are skipped.
    pub fn take_messages(&self) -> Vec<ServerMessage> {
        self.take_frames()
            .iter()
            .filter_map(|frame| ServerMessage::decode(frame).ok())
            .collect()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn send(&self, frame: Vec<u8>) -> SendStatus {
        let status = *self.status.lock();
        if status == SendStatus::Sent {
            self.frames.lock().push(frame);
        }
        status
    }
}

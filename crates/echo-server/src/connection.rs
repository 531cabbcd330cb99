//! Per-socket connection handle.
//!
//! The socket task owns the WebSocket; everything else (sessions, fan-out)
//! holds an `Arc<ClientConnection>` and talks to the socket through its
//! bounded outbound queue.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::metrics::FRAMES_DROPPED_TOTAL;

/// One serialized JSON text frame, shared by every recipient of a fan-out.
pub type Frame = Arc<String>;

/// Server-assigned identity of a socket. Sessions key their members by it.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Wrap an existing id.
    pub fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connected WebSocket client as seen by the relay.
pub struct ClientConnection {
    /// Unique connection id.
    pub id: ConnectionId,
    /// Outbound queue drained by the socket writer.
    tx: mpsc::Sender<Frame>,
    /// Cleared on close; fan-out skips connections that are not open.
    open: AtomicBool,
    /// Cancelled to make the socket task close the WebSocket.
    closer: CancellationToken,
    /// Frames dropped because the queue was full or gone.
    dropped_frames: AtomicU64,
}

impl ClientConnection {
    /// Create an open connection around an outbound queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            tx,
            open: AtomicBool::new(true),
            closer: CancellationToken::new(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Whether the connection still accepts frames.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` if the connection is closed, or if the queue is full or
    /// gone; in the latter case the drop counter is incremented. Nothing is
    /// retried.
    pub fn send(&self, frame: Frame) -> bool {
        if !self.is_open() {
            return false;
        }
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            counter!(FRAMES_DROPPED_TOTAL).increment(1);
            false
        }
    }

    /// Close the connection: stop accepting frames and signal the socket task.
    /// Idempotent.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.closer.cancel();
    }

    /// Token the socket task watches for [`close`](Self::close).
    pub fn close_token(&self) -> CancellationToken {
        self.closer.clone()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A connection backed by a plain channel, for tests that inspect what
    /// the relay would have written to the socket.
    pub(crate) fn channel_connection(
        id: &str,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Arc::new(ClientConnection::new(ConnectionId::from_raw(id), tx)),
            rx,
        )
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn_"));
    }

    #[tokio::test]
    async fn send_reaches_queue() {
        let (conn, mut rx) = channel_connection("c1", 4);
        assert!(conn.send(Arc::new("hello".into())));
        assert_eq!(rx.recv().await.unwrap().as_str(), "hello");
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let (conn, _rx) = channel_connection("c1", 1);
        assert!(conn.send(Arc::new("one".into())));
        assert!(!conn.send(Arc::new("two".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn gone_queue_drops() {
        let (conn, rx) = channel_connection("c1", 4);
        drop(rx);
        assert!(!conn.send(Arc::new("lost".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn closed_connection_skips_without_counting() {
        let (conn, mut rx) = channel_connection("c1", 4);
        conn.close();
        assert!(!conn.is_open());
        assert!(!conn.send(Arc::new("late".into())));
        assert_eq!(conn.drop_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_cancels_token_and_is_idempotent() {
        let (conn, _rx) = channel_connection("c1", 4);
        let token = conn.close_token();
        assert!(!token.is_cancelled());
        conn.close();
        conn.close();
        assert!(token.is_cancelled());
    }
}

//! WebSocket lifecycle for a single client, from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::connection::{ClientConnection, ConnectionId, Frame};
use crate::handler::ConnectionHandler;
use crate::hub::RelayHub;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// Interval between server-initiated Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long the writer may take to flush its Close frame once the reader is done.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Run a relay connection over an upgraded socket.
///
/// The writer task drains the connection's queue and pings every 30 s; it
/// sends a Close frame when the connection is closed, either by the reader
/// finishing or by an eviction from the hub. The reader feeds text frames
/// (and UTF-8 binary frames) to the [`ConnectionHandler`] until the client
/// goes away, the connection is closed, or `shutdown` fires.
#[instrument(skip_all, fields(conn = tracing::field::Empty))]
pub async fn run_socket(
    ws: WebSocket,
    hub: Arc<RelayHub>,
    queue_capacity: usize,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Frame>(queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(ConnectionId::new(), send_tx));
    let _ = tracing::Span::current().record("conn", tracing::field::display(&connection.id));

    let started = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let closed = connection.close_token();
    let writer_closed = closed.clone();
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = writer_closed.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut handler = ConnectionHandler::new(hub, Arc::clone(&connection));
    loop {
        let next = tokio::select! {
            next = ws_rx.next() => next,
            () = closed.cancelled() => {
                debug!("connection closed by relay");
                break;
            }
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
        };
        let Some(Ok(msg)) = next else { break };

        match msg {
            Message::Text(text) => handler.handle_text(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => handler.handle_text(text),
                Err(_) => debug!(len = data.len(), "dropping non-UTF8 binary frame"),
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    handler.handle_close();

    let abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_GRACE, writer).await.is_err() {
        abort.abort();
    }

    info!("client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

//! Per-connection message handling.
//!
//! Owns the connection's [`ConnectionState`] and turns each inbound text
//! frame into a hub operation. Transport concerns live in
//! [`socket`](crate::socket); this type never touches the WebSocket.

use std::sync::Arc;

use echo_protocol::{Inbound, JoinError, JoinRequest, Outbound};
use metrics::counter;
use tracing::{debug, trace, warn};

use crate::connection::ClientConnection;
use crate::hub::{ConnectionState, RelayHub, send_outbound};
use crate::metrics::{FRAMES_MALFORMED_TOTAL, JOIN_REJECTIONS_TOTAL};

/// Drives one connection through `Unjoined → Display | Phone → Closed`.
pub struct ConnectionHandler {
    hub: Arc<RelayHub>,
    connection: Arc<ClientConnection>,
    state: ConnectionState,
}

impl ConnectionHandler {
    /// A handler for a freshly accepted connection.
    pub fn new(hub: Arc<RelayHub>, connection: Arc<ClientConnection>) -> Self {
        Self {
            hub,
            connection,
            state: ConnectionState::Unjoined,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The connection this handler drives.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.connection
    }

    /// Handle one inbound text frame. Malformed frames are dropped; the
    /// connection stays open.
    pub fn handle_text(&mut self, text: &str) {
        let message = match Inbound::parse(text) {
            Ok(message) => message,
            Err(error) => {
                debug!(conn = %self.connection.id, %error, "dropping malformed frame");
                counter!(FRAMES_MALFORMED_TOTAL).increment(1);
                return;
            }
        };

        match message {
            Inbound::Join(request) => {
                if matches!(self.state, ConnectionState::Unjoined) {
                    self.join(request);
                } else {
                    debug!(conn = %self.connection.id, "already joined, ignoring join");
                }
            }
            message if self.state.is_joined() => {
                self.hub.relay(&self.connection.id, &self.state, message);
            }
            message => {
                trace!(conn = %self.connection.id, kind = message.kind(), "ignoring frame before join");
            }
        }
    }

    fn join(&mut self, request: JoinRequest) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let result = request
            .into_join(now_ms)
            .and_then(|join| self.hub.join(&self.connection, join, now_ms));
        match result {
            Ok(state) => self.state = state,
            Err(error) => {
                if error != JoinError::SessionFull {
                    warn!(conn = %self.connection.id, %error, "invalid join");
                    counter!(JOIN_REJECTIONS_TOTAL, "reason" => "invalid").increment(1);
                }
                let reply = Outbound::Error {
                    message: error.to_string(),
                };
                let _ = send_outbound(&self.connection, &reply);
            }
        }
    }

    /// Socket closed: leave the session and stop the writer. Idempotent.
    pub fn handle_close(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
        self.hub.leave(&self.connection.id, &state);
        self.connection.close();
    }
}

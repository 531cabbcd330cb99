//! Shared relay state: the session registry behind one lock.
//!
//! Every operation here takes the lock, mutates the registry, enqueues any
//! resulting frames and returns. Nothing awaits while the lock is held, so
//! joins, relays and closes are applied one at a time in a single total
//! order, and a fan-out never observes a half-applied membership change.

use std::sync::Arc;

use echo_protocol::{Inbound, Join, JoinError, JoinRole, Outbound, SessionCode};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::connection::{ClientConnection, ConnectionId, Frame};
use crate::metrics::{
    EVICTIONS_TOTAL, FRAMES_RELAYED_TOTAL, JOIN_REJECTIONS_TOTAL, JOINS_TOTAL, SESSIONS_ACTIVE,
    SESSIONS_SWEPT_TOTAL,
};
use crate::registry::SessionRegistry;
use crate::relay::{self, Audience, Sender};

/// Per-session membership caps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLimits {
    /// Phones allowed in one session.
    pub max_phones: usize,
    /// Displays allowed in one session.
    pub max_displays: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_phones: 64,
            max_displays: 8,
        }
    }
}

/// Lifecycle state of one connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Open, not yet attached to a session.
    #[default]
    Unjoined,
    /// Attached to `code` as a display.
    Display { code: SessionCode },
    /// Attached to `code` as a phone.
    Phone {
        code: SessionCode,
        /// Identity captured at join; fixed for the connection's lifetime.
        device_id: String,
    },
    /// Socket gone. Terminal.
    Closed,
}

impl ConnectionState {
    /// Session this connection belongs to, if joined.
    pub fn code(&self) -> Option<&SessionCode> {
        match self {
            Self::Display { code } | Self::Phone { code, .. } => Some(code),
            Self::Unjoined | Self::Closed => None,
        }
    }

    /// Whether the connection is attached to a session.
    pub fn is_joined(&self) -> bool {
        self.code().is_some()
    }

    fn sender(&self) -> Option<Sender<'_>> {
        match self {
            Self::Display { .. } => Some(Sender::Display),
            Self::Phone { device_id, .. } => Some(Sender::Phone { device_id }),
            Self::Unjoined | Self::Closed => None,
        }
    }
}

/// The relay's shared state.
#[derive(Debug)]
pub struct RelayHub {
    registry: Mutex<SessionRegistry>,
    limits: SessionLimits,
}

impl RelayHub {
    /// An empty hub.
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            limits,
        }
    }

    /// Configured caps.
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Attach `conn` to a session.
    ///
    /// On success the `joined` snapshot has been queued on `conn` and, for a
    /// phone, `echo_connected` on every display of the session. Any earlier
    /// phone connection with the same device id is removed and closed first;
    /// displays are not told about that removal. On error nothing changed.
    pub fn join(
        &self,
        conn: &Arc<ClientConnection>,
        join: Join,
        now_ms: i64,
    ) -> Result<ConnectionState, JoinError> {
        let Join { code, role } = join;
        let role_label = role.role().as_str();
        let mut registry = self.registry.lock();

        let state = match role {
            JoinRole::Display => {
                let full = registry
                    .get(&code)
                    .is_some_and(|s| s.display_count() >= self.limits.max_displays);
                if full {
                    reject(&code, role_label, &JoinError::SessionFull);
                    return Err(JoinError::SessionFull);
                }
                let session = registry.get_or_create(&code);
                session.add_display(Arc::clone(conn));
                let snapshot = Outbound::joined_display(code.clone(), session.phone_devices());
                let _ = send_outbound(conn, &snapshot);
                ConnectionState::Display { code }
            }
            JoinRole::Phone(profile) => {
                let full = registry.get(&code).is_some_and(|s| {
                    s.phone_count_excluding(&profile.device_id) >= self.limits.max_phones
                });
                if full {
                    reject(&code, role_label, &JoinError::SessionFull);
                    return Err(JoinError::SessionFull);
                }
                let session = registry.get_or_create(&code);
                for stale in session.evict_device(&profile.device_id, &conn.id) {
                    info!(
                        session = %code,
                        device_id = %profile.device_id,
                        evicted = %stale.connection.id,
                        "closing stale connection for reconnecting device"
                    );
                    counter!(EVICTIONS_TOTAL).increment(1);
                    stale.connection.close();
                }

                let device_id = profile.device_id.clone();
                let meta = profile.into_meta(now_ms);
                session.insert_phone(Arc::clone(conn), meta.clone());
                let _ = send_outbound(conn, &Outbound::joined_phone(code.clone(), device_id.clone()));
                let connected = Outbound::EchoConnected {
                    device: meta,
                    device_count: session.phone_count(),
                };
                if let Some(frame) = encode(&connected) {
                    let _ = session.send_to_displays(&frame);
                }
                ConnectionState::Phone { code, device_id }
            }
        };

        info!(session = %state_code(&state), conn = %conn.id, role = role_label, "joined");
        counter!(JOINS_TOTAL, "role" => role_label).increment(1);
        record_sessions(&registry);
        Ok(state)
    }

    /// Route a message from a joined connection to the other side of its
    /// session. Messages with no route, from unjoined connections, or from
    /// connections no longer in their session are dropped.
    pub fn relay(&self, conn: &ConnectionId, state: &ConnectionState, message: Inbound) {
        let (Some(code), Some(sender)) = (state.code(), state.sender()) else {
            return;
        };
        let kind = message.kind();
        let route = match relay::route(sender, message) {
            Ok(Some(route)) => route,
            Ok(None) => {
                debug!(session = %code, conn = %conn, kind, "no route for message");
                return;
            }
            Err(error) => {
                warn!(session = %code, conn = %conn, kind, %error, "failed to encode relayed frame");
                return;
            }
        };

        let registry = self.registry.lock();
        let Some(session) = registry.get(code) else {
            return;
        };
        let member = match sender {
            Sender::Display => session.has_display(conn),
            Sender::Phone { .. } => session.has_phone(conn),
        };
        if !member {
            debug!(session = %code, conn = %conn, kind, "sender no longer in session");
            return;
        }
        let delivered = match route.audience {
            Audience::Displays => session.send_to_displays(&route.frame),
            Audience::Phones => session.send_to_phones(&route.frame),
        };
        counter!(FRAMES_RELAYED_TOTAL, "kind" => kind).increment(1);
        debug!(session = %code, kind, delivered, "relayed");
    }

    /// Detach a connection. For a phone still in its session, displays get
    /// `echo_disconnected` with the remaining phone count. A session left
    /// with no members is removed.
    pub fn leave(&self, conn: &ConnectionId, state: &ConnectionState) {
        let Some(code) = state.code() else {
            return;
        };
        let mut registry = self.registry.lock();
        let Some(session) = registry.get_mut(code) else {
            return;
        };

        match state {
            ConnectionState::Display { .. } => {
                if session.remove_display(conn) {
                    info!(session = %code, conn = %conn, "display left");
                }
            }
            ConnectionState::Phone { device_id, .. } => {
                if let Some(entry) = session.remove_phone(conn) {
                    info!(session = %code, conn = %conn, device_id = %device_id, "phone left");
                    let gone = Outbound::EchoDisconnected {
                        device_id: entry.meta.device_id,
                        device_count: session.phone_count(),
                    };
                    if let Some(frame) = encode(&gone) {
                        let _ = session.send_to_displays(&frame);
                    }
                }
            }
            ConnectionState::Unjoined | ConnectionState::Closed => {}
        }

        if registry.remove_if_empty(code) {
            info!(session = %code, "session closed");
        }
        record_sessions(&registry);
    }

    /// Remove every empty session. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut registry = self.registry.lock();
        let removed = registry.sweep();
        if removed > 0 {
            counter!(SESSIONS_SWEPT_TOTAL).increment(removed as u64);
        }
        record_sessions(&registry);
        removed
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// `(displays, phones)` in a session, if it exists.
    pub fn session_size(&self, code: &SessionCode) -> Option<(usize, usize)> {
        self.registry
            .lock()
            .get(code)
            .map(|s| (s.display_count(), s.phone_count()))
    }

    /// Run `f` against the registry under the lock.
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut SessionRegistry) -> R) -> R {
        f(&mut self.registry.lock())
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new(SessionLimits::default())
    }
}

fn state_code(state: &ConnectionState) -> &str {
    state.code().map_or("", SessionCode::as_str)
}

fn reject(code: &SessionCode, role: &str, error: &JoinError) {
    warn!(session = %code, role, %error, "join refused");
    counter!(JOIN_REJECTIONS_TOTAL, "reason" => "session_full").increment(1);
}

fn encode(message: &Outbound) -> Option<Frame> {
    match message.encode() {
        Ok(text) => Some(Arc::new(text)),
        Err(error) => {
            warn!(%error, "failed to encode outbound message");
            None
        }
    }
}

/// Queue a relay-originated message on one connection.
pub(crate) fn send_outbound(conn: &ClientConnection, message: &Outbound) -> bool {
    encode(message).is_some_and(|frame| conn.send(frame))
}

#[allow(clippy::cast_precision_loss)]
fn record_sessions(registry: &SessionRegistry) {
    gauge!(SESSIONS_ACTIVE).set(registry.len() as f64);
}

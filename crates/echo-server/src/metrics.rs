//! Metric names recorded through the `metrics` facade.
//!
//! Nothing here installs a recorder; the binary opts into a Prometheus
//! exporter. Without one, every macro call is a no-op.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Accepted joins total (counter, labels: role).
pub const JOINS_TOTAL: &str = "relay_joins_total";
/// Refused joins total (counter, labels: reason).
pub const JOIN_REJECTIONS_TOTAL: &str = "relay_join_rejections_total";
/// Phone connections closed because the same device reconnected (counter).
pub const EVICTIONS_TOTAL: &str = "relay_evictions_total";
/// Frames fanned out total, counted once per message (counter, labels: kind).
pub const FRAMES_RELAYED_TOTAL: &str = "relay_frames_relayed_total";
/// Frames dropped on a full or closed outbound queue (counter).
pub const FRAMES_DROPPED_TOTAL: &str = "relay_frames_dropped_total";
/// Inbound frames discarded as malformed (counter).
pub const FRAMES_MALFORMED_TOTAL: &str = "relay_frames_malformed_total";
/// Sessions currently in the registry (gauge).
pub const SESSIONS_ACTIVE: &str = "relay_sessions_active";
/// Empty sessions removed by the periodic sweep (counter).
pub const SESSIONS_SWEPT_TOTAL: &str = "relay_sessions_swept_total";

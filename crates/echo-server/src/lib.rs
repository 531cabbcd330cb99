//! # echo-server
//!
//! WebSocket relay pairing one display with many phones under a short
//! session code.
//!
//! - [`registry`] / [`session`]: who is connected to which code
//! - [`hub`]: the registry behind one lock, with join/relay/leave/sweep
//! - [`relay`]: which messages go where, and in what shape
//! - [`handler`]: per-connection state machine
//! - [`socket`]: WebSocket reader/writer tasks
//! - [`server`]: listener, upgrade endpoint, background sweep

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod socket;
pub mod sweeper;

pub use config::ServerConfig;
pub use error::ServerError;
pub use hub::{ConnectionState, RelayHub, SessionLimits};
pub use server::{RelayServer, ServerHandle};
pub use shutdown::{ShutdownCoordinator, wait_for_signal};

//! # echo-protocol
//!
//! Wire types for the session relay: one display (the Bridge) and many
//! phones (Echoes) share a human-entered session code and exchange JSON
//! messages, one object per WebSocket frame.
//!
//! - [`SessionCode`]: case-insensitive session identity, normalized to uppercase
//! - [`Role`], [`PhoneMeta`]: who a connection is once it has joined
//! - [`Inbound`]: classification of a client frame (join, telemetry, game/player events)
//! - [`Outbound`]: envelopes the relay itself originates
//!
//! This crate does no I/O.

#![deny(unsafe_code)]

pub mod code;
pub mod error;
pub mod inbound;
pub mod outbound;
pub mod types;

pub use code::SessionCode;
pub use error::{JoinError, ProtocolError};
pub use inbound::{FuelBoost, Inbound, Join, JoinRequest, JoinRole, PhoneProfile, VolumeSample};
pub use outbound::{JoinedSnapshot, Outbound, with_device_id};
pub use types::{PhoneMeta, Role};

/// Type prefix of display-authored game-flow events relayed to phones.
pub const GAME_PREFIX: &str = "game:";

/// Type prefix of phone-authored gameplay events relayed to displays.
pub const PLAYER_PREFIX: &str = "player:";

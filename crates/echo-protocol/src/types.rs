//! Roles and per-phone metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JoinError;

/// Role a connection takes when it joins a session.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The big screen. Authority for game-flow events.
    Display,
    /// A participant device. Authority for telemetry and gameplay events.
    Phone,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display" => Ok(Self::Display),
            "phone" => Ok(Self::Phone),
            other => Err(JoinError::UnknownRole(other.to_owned())),
        }
    }
}

/// What displays learn about a connected phone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneMeta {
    /// Client-chosen stable identity, used for reconnect dedup.
    pub device_id: String,
    /// Display name shown on the big screen.
    pub name: String,
    /// Language code of the player.
    pub language: String,
    /// Join time in Unix epoch milliseconds.
    pub joined_at: i64,
}

//! Routing table for joined connections.
//!
//! | sender  | message      | audience | frame                          |
//! |---------|--------------|----------|--------------------------------|
//! | phone   | `volume`     | displays | `volume` + sender's `deviceId` |
//! | display | `fuel_boost` | phones   | `{type, amount}`               |
//! | display | `game:*`     | phones   | unchanged                      |
//! | phone   | `player:*`   | displays | object + sender's `deviceId`   |
//!
//! Anything else (wrong role, `join`, unknown types) has no route.

use std::sync::Arc;

use echo_protocol::{Inbound, Outbound, with_device_id};
use serde_json::Value;

use crate::connection::Frame;

/// Which side of a session receives a routed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Every display in the sender's session.
    Displays,
    /// Every phone in the sender's session.
    Phones,
}

/// Routing identity of a joined sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender<'a> {
    /// A joined display.
    Display,
    /// A joined phone and the device id it joined with.
    Phone { device_id: &'a str },
}

/// A frame ready for fan-out.
#[derive(Clone, Debug)]
pub struct Route {
    /// Who receives the frame.
    pub audience: Audience,
    /// The serialized message.
    pub frame: Frame,
}

/// Decide where `message` goes and serialize it once for all recipients.
///
/// `Ok(None)` means the message is not relayed.
pub fn route(sender: Sender<'_>, message: Inbound) -> serde_json::Result<Option<Route>> {
    let (audience, text) = match (sender, message) {
        (Sender::Phone { device_id }, Inbound::Volume(sample)) => (
            Audience::Displays,
            Outbound::Volume {
                device_id: device_id.to_owned(),
                volume: sample.volume,
                is_speaking: sample.is_speaking,
            }
            .encode()?,
        ),
        (Sender::Display, Inbound::FuelBoost(boost)) => (
            Audience::Phones,
            Outbound::FuelBoost {
                amount: boost.amount,
            }
            .encode()?,
        ),
        (Sender::Display, Inbound::Game(event)) => {
            (Audience::Phones, serde_json::to_string(&Value::Object(event))?)
        }
        (Sender::Phone { device_id }, Inbound::Player(event)) => (
            Audience::Displays,
            serde_json::to_string(&Value::Object(with_device_id(event, device_id)))?,
        ),
        _ => return Ok(None),
    };
    Ok(Some(Route {
        audience,
        frame: Arc::new(text),
    }))
}

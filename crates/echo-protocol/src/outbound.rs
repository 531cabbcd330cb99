//! Relay-to-client messages.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::code::SessionCode;
use crate::types::{PhoneMeta, Role};

/// Messages the relay originates or reshapes. `game:*` passthrough frames
/// are not represented here; they leave the relay exactly as they arrived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Join accepted.
    Joined(JoinedSnapshot),
    /// Join refused.
    Error { message: String },
    /// A phone joined the display's session.
    EchoConnected {
        device: PhoneMeta,
        #[serde(rename = "deviceCount")]
        device_count: usize,
    },
    /// A phone left the display's session.
    EchoDisconnected {
        #[serde(rename = "deviceId")]
        device_id: String,
        #[serde(rename = "deviceCount")]
        device_count: usize,
    },
    /// Speech telemetry, stamped with the sending phone's id.
    Volume {
        #[serde(rename = "deviceId")]
        device_id: String,
        volume: Number,
        #[serde(rename = "isSpeaking")]
        is_speaking: bool,
    },
    /// Fuel boost from the display.
    FuelBoost { amount: Number },
}

impl Outbound {
    /// Snapshot sent to a display on join, listing the phones already present.
    pub fn joined_display(code: SessionCode, devices: Vec<PhoneMeta>) -> Self {
        Self::Joined(JoinedSnapshot {
            role: Role::Display,
            code,
            devices: Some(devices),
            device_id: None,
        })
    }

    /// Snapshot sent to a phone on join, echoing its device id.
    pub fn joined_phone(code: SessionCode, device_id: String) -> Self {
        Self::Joined(JoinedSnapshot {
            role: Role::Phone,
            code,
            devices: None,
            device_id: Some(device_id),
        })
    }

    /// Serialize to a single JSON text frame.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Body of a `joined` message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinedSnapshot {
    pub role: Role,
    pub code: SessionCode,
    /// Present for displays only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<PhoneMeta>>,
    /// Present for phones only.
    #[serde(
        rename = "deviceId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub device_id: Option<String>,
}

/// Stamp a `player:*` object with the sender's device id. A client-supplied
/// `deviceId` is overwritten so displays can trust the field.
pub fn with_device_id(mut event: Map<String, Value>, device_id: &str) -> Map<String, Value> {
    let _ = event.insert("deviceId".to_owned(), Value::String(device_id.to_owned()));
    event
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn code(raw: &str) -> SessionCode {
        SessionCode::parse(raw).unwrap()
    }

    #[test]
    fn joined_display_shape() {
        let msg = Outbound::joined_display(code("qrst"), Vec::new());
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "joined", "role": "display", "code": "QRST", "devices": []})
        );
    }

    #[test]
    fn joined_phone_shape() {
        let msg = Outbound::joined_phone(code("qrst"), "d1".into());
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "joined", "role": "phone", "code": "QRST", "deviceId": "d1"})
        );
    }

    #[test]
    fn echo_connected_shape() {
        let msg = Outbound::EchoConnected {
            device: PhoneMeta {
                device_id: "d1".into(),
                name: "Amy".into(),
                language: "en".into(),
                joined_at: 42,
            },
            device_count: 1,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "echo_connected");
        assert_eq!(value["device"]["deviceId"], "d1");
        assert_eq!(value["device"]["joinedAt"], 42);
        assert_eq!(value["deviceCount"], 1);
    }

    #[test]
    fn echo_disconnected_shape() {
        let msg = Outbound::EchoDisconnected {
            device_id: "d1".into(),
            device_count: 0,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "echo_disconnected", "deviceId": "d1", "deviceCount": 0})
        );
    }

    #[test]
    fn volume_keeps_number_text() {
        let msg = Outbound::Volume {
            device_id: "d1".into(),
            volume: serde_json::from_str("0.4").unwrap(),
            is_speaking: true,
        };
        let text = msg.encode().unwrap();
        assert!(text.contains(r#""volume":0.4"#));
        assert!(text.contains(r#""isSpeaking":true"#));
    }

    #[test]
    fn fuel_boost_integer_stays_integer() {
        let msg = Outbound::FuelBoost {
            amount: Number::from(10),
        };
        assert_eq!(msg.encode().unwrap(), r#"{"type":"fuel_boost","amount":10}"#);
    }

    #[test]
    fn error_shape() {
        let msg = Outbound::Error {
            message: "missing role".into(),
        };
        assert_eq!(
            msg.encode().unwrap(),
            r#"{"type":"error","message":"missing role"}"#
        );
    }

    #[test]
    fn decodes_what_it_encodes() {
        let msg = Outbound::joined_phone(code("abcd"), "p1".into());
        let back: Outbound = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn device_id_is_inserted() {
        let Value::Object(event) = json!({"type": "player:word_scored", "word": "sol"}) else {
            unreachable!()
        };
        let stamped = with_device_id(event, "p9");
        assert_eq!(stamped["deviceId"], "p9");
        assert_eq!(stamped["word"], "sol");
    }

    #[test]
    fn client_device_id_is_overwritten() {
        let Value::Object(event) = json!({"type": "player:buzz", "deviceId": "spoofed"}) else {
            unreachable!()
        };
        let stamped = with_device_id(event, "p9");
        assert_eq!(stamped["deviceId"], "p9");
    }
}

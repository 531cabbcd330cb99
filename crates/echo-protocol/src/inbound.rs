//! Client-to-relay messages.
//!
//! A frame is first parsed as a JSON object, then classified by its `type`
//! string. Four types have a fixed shape (`join`, `volume`, `fuel_boost`);
//! the `game:` and `player:` families are kept as raw objects because the
//! relay only routes them and never reads their bodies.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::code::SessionCode;
use crate::error::{JoinError, ProtocolError};
use crate::types::{PhoneMeta, Role};
use crate::{GAME_PREFIX, PLAYER_PREFIX};

/// Name given to phones that join without one.
pub const DEFAULT_PHONE_NAME: &str = "Echo";

/// Language assumed for phones that join without one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A classified client frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// `join`: attach this connection to a session.
    Join(JoinRequest),
    /// `volume`: speech telemetry from a phone.
    Volume(VolumeSample),
    /// `fuel_boost`: a display rewarding the phones.
    FuelBoost(FuelBoost),
    /// `game:*`: display-authored event, relayed verbatim.
    Game(Map<String, Value>),
    /// `player:*`: phone-authored event, relayed with the sender's device id.
    Player(Map<String, Value>),
    /// Any other type. Ignored by the relay.
    Unknown(String),
}

impl Inbound {
    /// Parse and classify one text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(ProtocolError::MissingType),
        };

        match kind.as_str() {
            "join" => Ok(Self::Join(typed(&kind, map)?)),
            "volume" => Ok(Self::Volume(typed(&kind, map)?)),
            "fuel_boost" => Ok(Self::FuelBoost(typed(&kind, map)?)),
            k if k.starts_with(GAME_PREFIX) => Ok(Self::Game(map)),
            k if k.starts_with(PLAYER_PREFIX) => Ok(Self::Player(map)),
            _ => Ok(Self::Unknown(kind)),
        }
    }

    /// Short label for logs and metrics. `game:*` and `player:*` collapse to
    /// their family so label cardinality stays bounded.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Volume(_) => "volume",
            Self::FuelBoost(_) => "fuel_boost",
            Self::Game(_) => "game",
            Self::Player(_) => "player",
            Self::Unknown(_) => "unknown",
        }
    }
}

fn typed<T: DeserializeOwned>(kind: &str, map: Map<String, Value>) -> Result<T, ProtocolError> {
    serde_json::from_value(Value::Object(map)).map_err(|source| ProtocolError::InvalidPayload {
        kind: kind.to_owned(),
        source,
    })
}

/// Raw `join` fields, all optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub code: Option<String>,
    pub role: Option<String>,
    pub device_id: Option<String>,
    pub name: Option<String>,
    pub language: Option<String>,
}

impl JoinRequest {
    /// Validate the request and fill in phone defaults.
    ///
    /// `now_ms` seeds the fallback device id when the phone did not send one.
    pub fn into_join(self, now_ms: i64) -> Result<Join, JoinError> {
        let code = self
            .code
            .as_deref()
            .and_then(SessionCode::parse)
            .ok_or(JoinError::MissingCode)?;
        let role: Role = match self.role.as_deref() {
            None | Some("") => return Err(JoinError::MissingRole),
            Some(raw) => raw.parse()?,
        };

        let role = match role {
            Role::Display => JoinRole::Display,
            Role::Phone => JoinRole::Phone(PhoneProfile {
                device_id: non_empty(self.device_id).unwrap_or_else(|| format!("echo-{now_ms}")),
                name: non_empty(self.name).unwrap_or_else(|| DEFAULT_PHONE_NAME.to_owned()),
                language: non_empty(self.language).unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned()),
            }),
        };
        Ok(Join { code, role })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A validated join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub code: SessionCode,
    pub role: JoinRole,
}

/// Role of a validated join. A phone always carries its identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinRole {
    Display,
    Phone(PhoneProfile),
}

impl JoinRole {
    /// The wire role.
    pub fn role(&self) -> Role {
        match self {
            Self::Display => Role::Display,
            Self::Phone(_) => Role::Phone,
        }
    }
}

/// Identity a phone announces on join, with defaults applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneProfile {
    pub device_id: String,
    pub name: String,
    pub language: String,
}

impl PhoneProfile {
    /// Stamp the profile with its join time.
    pub fn into_meta(self, joined_at: i64) -> PhoneMeta {
        PhoneMeta {
            device_id: self.device_id,
            name: self.name,
            language: self.language,
            joined_at,
        }
    }
}

/// `volume` payload. The number is kept as sent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSample {
    pub volume: Number,
    #[serde(default)]
    pub is_speaking: bool,
}

/// `fuel_boost` payload. The number is kept as sent.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FuelBoost {
    pub amount: Number,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join() {
        let msg = Inbound::parse(
            r#"{"type":"join","code":"qrst","role":"phone","deviceId":"d1","name":"Amy","language":"en"}"#,
        )
        .unwrap();
        let Inbound::Join(req) = msg else {
            panic!("expected join, got {msg:?}");
        };
        assert_eq!(req.code.as_deref(), Some("qrst"));
        assert_eq!(req.device_id.as_deref(), Some("d1"));
    }

    #[test]
    fn join_normalizes_code_and_keeps_identity() {
        let req = JoinRequest {
            code: Some("qrst".into()),
            role: Some("phone".into()),
            device_id: Some("d1".into()),
            name: Some("Amy".into()),
            language: Some("es".into()),
        };
        let join = req.into_join(5).unwrap();
        assert_eq!(join.code.as_str(), "QRST");
        assert_eq!(
            join.role,
            JoinRole::Phone(PhoneProfile {
                device_id: "d1".into(),
                name: "Amy".into(),
                language: "es".into(),
            })
        );
    }

    #[test]
    fn phone_join_fills_defaults() {
        let req = JoinRequest {
            code: Some("abcd".into()),
            role: Some("phone".into()),
            ..JoinRequest::default()
        };
        let join = req.into_join(1_700_000_000_123).unwrap();
        let JoinRole::Phone(profile) = join.role else {
            panic!("expected phone");
        };
        assert_eq!(profile.device_id, "echo-1700000000123");
        assert_eq!(profile.name, DEFAULT_PHONE_NAME);
        assert_eq!(profile.language, DEFAULT_LANGUAGE);
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let req = JoinRequest {
            code: Some("abcd".into()),
            role: Some("phone".into()),
            device_id: Some(String::new()),
            name: Some(String::new()),
            language: Some(String::new()),
        };
        let JoinRole::Phone(profile) = req.into_join(7).unwrap().role else {
            panic!("expected phone");
        };
        assert_eq!(profile.device_id, "echo-7");
        assert_eq!(profile.name, DEFAULT_PHONE_NAME);
    }

    #[test]
    fn join_without_code_is_refused() {
        let req = JoinRequest {
            role: Some("display".into()),
            ..JoinRequest::default()
        };
        assert_eq!(req.into_join(0).unwrap_err(), JoinError::MissingCode);

        let blank = JoinRequest {
            code: Some("  ".into()),
            role: Some("display".into()),
            ..JoinRequest::default()
        };
        assert_eq!(blank.into_join(0).unwrap_err(), JoinError::MissingCode);
    }

    #[test]
    fn join_without_role_is_refused() {
        let req = JoinRequest {
            code: Some("abcd".into()),
            ..JoinRequest::default()
        };
        assert_eq!(req.into_join(0).unwrap_err(), JoinError::MissingRole);
    }

    #[test]
    fn join_with_unknown_role_is_refused() {
        let req = JoinRequest {
            code: Some("abcd".into()),
            role: Some("projector".into()),
            ..JoinRequest::default()
        };
        assert_eq!(
            req.into_join(0).unwrap_err(),
            JoinError::UnknownRole("projector".into())
        );
    }

    #[test]
    fn display_join_ignores_phone_fields() {
        let req = JoinRequest {
            code: Some("abcd".into()),
            role: Some("display".into()),
            device_id: Some("d1".into()),
            ..JoinRequest::default()
        };
        assert_eq!(req.into_join(0).unwrap().role, JoinRole::Display);
    }

    #[test]
    fn parses_volume_keeping_number() {
        let msg = Inbound::parse(r#"{"type":"volume","volume":0.4,"isSpeaking":true}"#).unwrap();
        let Inbound::Volume(sample) = msg else {
            panic!("expected volume");
        };
        assert_eq!(sample.volume.to_string(), "0.4");
        assert!(sample.is_speaking);
    }

    #[test]
    fn volume_is_speaking_defaults_false() {
        let msg = Inbound::parse(r#"{"type":"volume","volume":1}"#).unwrap();
        assert!(matches!(msg, Inbound::Volume(VolumeSample { is_speaking: false, .. })));
    }

    #[test]
    fn volume_with_wrong_type_is_invalid() {
        let err = Inbound::parse(r#"{"type":"volume","volume":"loud"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref kind, .. } if kind == "volume"));
    }

    #[test]
    fn parses_fuel_boost_integer() {
        let msg = Inbound::parse(r#"{"type":"fuel_boost","amount":10}"#).unwrap();
        let Inbound::FuelBoost(boost) = msg else {
            panic!("expected fuel_boost");
        };
        assert_eq!(boost.amount.to_string(), "10");
    }

    #[test]
    fn game_prefix_keeps_whole_object() {
        let msg = Inbound::parse(r#"{"type":"game:round_end","winner":"red","scores":[1,2]}"#)
            .unwrap();
        let Inbound::Game(map) = msg else {
            panic!("expected game event");
        };
        assert_eq!(map["winner"], "red");
        assert_eq!(map["scores"], serde_json::json!([1, 2]));
    }

    #[test]
    fn player_prefix_is_classified() {
        let msg = Inbound::parse(r#"{"type":"player:word_scored","word":"sol"}"#).unwrap();
        assert_eq!(msg.kind(), "player");
    }

    #[test]
    fn bare_prefix_words_are_unknown() {
        let msg = Inbound::parse(r#"{"type":"game"}"#).unwrap();
        assert_eq!(msg, Inbound::Unknown("game".into()));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let msg = Inbound::parse(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, Inbound::Unknown("chat".into()));
        assert_eq!(msg.kind(), "unknown");
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            Inbound::parse("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            Inbound::parse("[1,2,3]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            Inbound::parse(r#"{"code":"abcd"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            Inbound::parse(r#"{"type":42}"#),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn join_with_non_string_code_is_invalid() {
        let err = Inbound::parse(r#"{"type":"join","code":1234,"role":"phone"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref kind, .. } if kind == "join"));
    }
}

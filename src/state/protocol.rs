//! Wire protocol.
//!
//! Every frame is a JSON envelope `{"type": <tag>, "payload": {...}}`.
//! Outbound commands are built from [`ClientMessage`]; inbound frames are
//! decoded once into [`ServerMessage`] and matched exhaustively after that.

use std::fmt;

use serde_json::{json, Map, Value};

use super::display::DisplayState;

/// Source tag sent with join requests.
pub const TERMINAL_SOURCE: &str = "terminal";

/// Player identity this terminal registers as.
///
/// Assigned once before the session starts and re-sent with every join.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity for a numbered seat, matching the web client's format.
    pub fn player(number: u8) -> Self {
        Self(number.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::player(1)
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Messages from terminal to server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join { player_id: SessionIdentity },
    Rejoin { player_id: SessionIdentity },
    SelectUp,
    SelectDown,
    Confirm,
    Abstain,
    UseItem { item_id: String },
    IdleScrollUp,
    IdleScrollDown,
    Heartbeat,
}

impl ClientMessage {
    pub fn type_str(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Rejoin { .. } => "rejoin",
            Self::SelectUp => "selectUp",
            Self::SelectDown => "selectDown",
            Self::Confirm => "confirm",
            Self::Abstain => "abstain",
            Self::UseItem { .. } => "useItem",
            Self::IdleScrollUp => "idleScrollUp",
            Self::IdleScrollDown => "idleScrollDown",
            Self::Heartbeat => "heartbeat",
        }
    }

    /// Join and rejoin bypass the connected-only gate on outbound traffic.
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Join { .. } | Self::Rejoin { .. })
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::Join { player_id } | Self::Rejoin { player_id } => json!({
                "playerId": player_id.as_str(),
                "source": TERMINAL_SOURCE
            }),
            Self::UseItem { item_id } => json!({ "itemId": item_id }),
            _ => Value::Object(Map::new()),
        }
    }

    /// Convert to the JSON envelope.
    pub fn to_json(&self) -> Value {
        json!({
            "type": self.type_str(),
            "payload": self.payload()
        })
    }

    /// Serialize to a text frame.
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    /// Parse a frame the way the server reads it.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let (tag, payload) = split_envelope(text)?;
        let player_id = || {
            payload["playerId"]
                .as_str()
                .map(SessionIdentity::new)
                .ok_or(DecodeError::MissingField("playerId"))
        };

        match tag.as_str() {
            "join" => Ok(Self::Join {
                player_id: player_id()?,
            }),
            "rejoin" => Ok(Self::Rejoin {
                player_id: player_id()?,
            }),
            "selectUp" => Ok(Self::SelectUp),
            "selectDown" => Ok(Self::SelectDown),
            "confirm" => Ok(Self::Confirm),
            "abstain" => Ok(Self::Abstain),
            "useItem" => payload["itemId"]
                .as_str()
                .map(|id| Self::UseItem {
                    item_id: id.to_string(),
                })
                .ok_or(DecodeError::MissingField("itemId")),
            "idleScrollUp" => Ok(Self::IdleScrollUp),
            "idleScrollDown" => Ok(Self::IdleScrollDown),
            "heartbeat" => Ok(Self::Heartbeat),
            _ => Err(DecodeError::UnknownType(tag)),
        }
    }
}

/// Messages from server to terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Join accepted
    Welcome,

    /// Join or action refused
    Error { message: String },

    /// Display push; `None` when the payload had no `display` object
    PlayerState { display: Option<DisplayState> },

    GameState,
    PlayerList,
    EventPrompt,
    EventResult,
    PhaseChange,

    /// A type this terminal does not know
    Unknown(String),
}

impl ServerMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let (tag, payload) = split_envelope(text)?;

        Ok(match tag.as_str() {
            "welcome" => Self::Welcome,
            "error" => Self::Error {
                message: payload["message"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            "playerState" => Self::PlayerState {
                display: payload
                    .get("display")
                    .filter(|d| d.is_object())
                    .map(DisplayState::from_json),
            },
            "gameState" => Self::GameState,
            "playerList" => Self::PlayerList,
            "eventPrompt" => Self::EventPrompt,
            "eventResult" => Self::EventResult,
            "phaseChange" => Self::PhaseChange,
            _ => Self::Unknown(tag),
        })
    }
}

/// Split a frame into its type tag and payload object.
fn split_envelope(text: &str) -> Result<(String, Value), DecodeError> {
    let mut value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
    let obj = value.as_object_mut().ok_or(DecodeError::NotAnObject)?;

    let tag = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();
    let payload = obj
        .remove("payload")
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Map::new()));

    Ok((tag, payload))
}

/// Inbound frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Json(String),
    NotAnObject,
    MissingType,
    MissingField(&'static str),
    UnknownType(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(reason) => write!(f, "Invalid JSON: {}", reason),
            Self::NotAnObject => write!(f, "Frame is not a JSON object"),
            Self::MissingType => write!(f, "Frame has no type field"),
            Self::MissingField(field) => write!(f, "Payload has no {} field", field),
            Self::UnknownType(tag) => write!(f, "Unknown message type {}", tag),
        }
    }
}

impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::display::LedState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_envelope() {
        let msg = ClientMessage::Join {
            player_id: SessionIdentity::player(3),
        };
        assert_eq!(
            msg.to_json(),
            json!({
                "type": "join",
                "payload": { "playerId": "3", "source": "terminal" }
            })
        );
        assert!(msg.is_registration());
    }

    #[test]
    fn test_empty_payload_commands() {
        for msg in [
            ClientMessage::SelectUp,
            ClientMessage::SelectDown,
            ClientMessage::Confirm,
            ClientMessage::Abstain,
        ] {
            let value: Value = serde_json::from_str(&msg.encode()).unwrap();
            assert_eq!(value["type"], msg.type_str());
            assert_eq!(value["payload"], json!({}));
            assert!(!msg.is_registration());
        }
    }

    #[test]
    fn test_use_item_reaches_peer() {
        let frame = ClientMessage::UseItem {
            item_id: "torch".to_string(),
        }
        .encode();

        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["payload"], json!({ "itemId": "torch" }));
        assert_eq!(
            ClientMessage::decode(&frame).unwrap(),
            ClientMessage::UseItem {
                item_id: "torch".to_string()
            }
        );
    }

    #[test]
    fn test_decode_welcome_and_error() {
        assert_eq!(
            ServerMessage::decode(r#"{"type":"welcome"}"#).unwrap(),
            ServerMessage::Welcome
        );
        assert_eq!(
            ServerMessage::decode(r#"{"type":"error","payload":{"message":"name taken"}}"#)
                .unwrap(),
            ServerMessage::Error {
                message: "name taken".to_string()
            }
        );
        assert_eq!(
            ServerMessage::decode(r#"{"type":"error"}"#).unwrap(),
            ServerMessage::Error {
                message: "Unknown error".to_string()
            }
        );
    }

    #[test]
    fn test_decode_player_state() {
        let msg = ServerMessage::decode(
            r#"{"type":"playerState","payload":{"display":{"line2":{"text":"VOTE"}}}}"#,
        )
        .unwrap();
        let ServerMessage::PlayerState { display: Some(display) } = msg else {
            panic!("expected a display push");
        };
        assert_eq!(display.line2.text, "VOTE");
        assert_eq!(display.leds.yes, LedState::Off);

        assert_eq!(
            ServerMessage::decode(r#"{"type":"playerState","payload":{}}"#).unwrap(),
            ServerMessage::PlayerState { display: None }
        );
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            ServerMessage::decode("{not json"),
            Err(DecodeError::Json(_))
        ));
        assert_eq!(
            ServerMessage::decode("[1, 2]"),
            Err(DecodeError::NotAnObject)
        );
        assert_eq!(
            ServerMessage::decode(r#"{"payload":{}}"#),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            ServerMessage::decode(r#"{"type":7}"#),
            Err(DecodeError::MissingType)
        );
    }

    #[test]
    fn test_unknown_and_passive_types() {
        assert_eq!(
            ServerMessage::decode(r#"{"type":"gameState","payload":{"day":2}}"#).unwrap(),
            ServerMessage::GameState
        );
        assert_eq!(
            ServerMessage::decode(r#"{"type":"confetti"}"#).unwrap(),
            ServerMessage::Unknown("confetti".to_string())
        );
    }
}

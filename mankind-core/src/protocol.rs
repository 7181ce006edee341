//! Duel wire protocol.
//!
//! Every frame is a JSON object tagged with `"type"`. Server frames go
//! through [`ServerMessage::from_json`], which inspects the tag before
//! decoding so that an unknown event can be told apart from a broken
//! payload of a known event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InvalidDecision, ProtocolError};

/// `type` tags of every server message this client understands.
pub const SERVER_MESSAGE_TYPES: [&str; 4] = ["game_start", "message", "time_up", "game_result"];

/// A message pushed by the duel server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A new duel has begun.
    GameStart {
        /// Level the duel is played at.
        level: i64,
        /// Optional banner text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Length of the duel in seconds, as the server counts it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_remaining: Option<i64>,
    },

    /// A chat line, optionally carrying the server's countdown.
    Message {
        /// Who wrote the line (`"opponent"` for the counterpart).
        sender: String,
        /// The line itself.
        content: String,
        /// Authoritative seconds left in the duel.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_remaining: Option<i64>,
    },

    /// The chat window has closed; a decision is due.
    TimeUp {
        /// Optional prompt text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The server scored the duel.
    GameResult {
        /// Whether the local guess was right.
        correct: bool,
        /// Score change (may be negative).
        score: i64,
        /// What the opponent actually was (`"human"` or `"ai"`).
        opponent_type: String,
        /// Player level after scoring.
        new_level: i64,
        /// Player XP after scoring.
        new_xp: i64,
    },
}

impl ServerMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] describing why the frame was rejected.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let Some(obj) = value.as_object() else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = match obj.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(ProtocolError::MissingType),
        };
        if !SERVER_MESSAGE_TYPES.contains(&kind.as_str()) {
            return Err(ProtocolError::UnknownType(kind));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }

    /// Returns the wire `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GameStart { .. } => "game_start",
            Self::Message { .. } => "message",
            Self::TimeUp { .. } => "time_up",
            Self::GameResult { .. } => "game_result",
        }
    }
}

/// A message sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A chat line typed by the local participant.
    Message {
        /// The line, already trimmed.
        content: String,
    },

    /// The local guess. `None` is an abstention and serializes as `null`.
    Decision {
        /// The guess.
        decision: Option<Decision>,
    },

    /// Ask the server for another duel.
    NextDuel,
}

impl ClientMessage {
    /// Serializes the message as a single JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Returns the wire `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Decision { .. } => "decision",
            Self::NextDuel => "next_duel",
        }
    }
}

/// The local participant's guess about the opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The opponent is a person.
    Human,
    /// The opponent is an automated agent.
    Ai,
}

impl Decision {
    /// Wire spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = InvalidDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "ai" => Ok(Self::Ai),
            other => Err(InvalidDecision(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_game_start_ignoring_extra_fields() {
        let msg = ServerMessage::from_json(
            r#"{"type":"game_start","level":3,"message":"Duel started!","time_remaining":120,"opponent":"?"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::GameStart {
                level: 3,
                message: Some("Duel started!".to_string()),
                time_remaining: Some(120),
            }
        );
        assert_eq!(msg.kind(), "game_start");
    }

    #[test]
    fn decodes_message_without_time_remaining() {
        let msg =
            ServerMessage::from_json(r#"{"type":"message","sender":"opponent","content":"hi"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ServerMessage::Message {
                sender: "opponent".to_string(),
                content: "hi".to_string(),
                time_remaining: None,
            }
        );
    }

    #[test]
    fn decodes_bare_time_up() {
        let msg = ServerMessage::from_json(r#"{"type":"time_up"}"#).unwrap();
        assert_eq!(msg, ServerMessage::TimeUp { message: None });
    }

    #[test]
    fn decodes_game_result() {
        let msg = ServerMessage::from_json(
            r#"{"type":"game_result","correct":false,"score":-25,"opponent_type":"ai","new_level":1,"new_xp":0}"#,
        )
        .unwrap();
        match msg {
            ServerMessage::GameResult { correct, score, .. } => {
                assert!(!correct);
                assert_eq!(score, -25);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_json() {
        let err = ServerMessage::from_json("{not json").unwrap_err();
        assert_eq!(err.category(), "invalid_json");
    }

    #[test]
    fn rejects_non_object() {
        assert_eq!(
            ServerMessage::from_json("[1,2]").unwrap_err(),
            ProtocolError::NotAnObject
        );
    }

    #[test]
    fn rejects_missing_or_non_string_type() {
        assert_eq!(
            ServerMessage::from_json(r#"{"level":1}"#).unwrap_err(),
            ProtocolError::MissingType
        );
        assert_eq!(
            ServerMessage::from_json(r#"{"type":7}"#).unwrap_err(),
            ProtocolError::MissingType
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(
            ServerMessage::from_json(r#"{"type":"leaderboard"}"#).unwrap_err(),
            ProtocolError::UnknownType("leaderboard".to_string())
        );
    }

    #[test]
    fn rejects_known_type_with_missing_field() {
        let err = ServerMessage::from_json(r#"{"type":"game_start"}"#).unwrap_err();
        match err {
            ProtocolError::InvalidPayload { kind, reason } => {
                assert_eq!(kind, "game_start");
                assert!(reason.contains("level"), "reason: {reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn client_messages_match_wire_format() {
        let chat = ClientMessage::Message {
            content: "hello".to_string(),
        };
        let human = ClientMessage::Decision {
            decision: Some(Decision::Human),
        };
        let abstain = ClientMessage::Decision { decision: None };

        let as_value = |m: &ClientMessage| -> Value {
            serde_json::from_str(&m.to_json().unwrap()).unwrap()
        };
        assert_eq!(as_value(&chat), json!({"type": "message", "content": "hello"}));
        assert_eq!(as_value(&human), json!({"type": "decision", "decision": "human"}));
        assert_eq!(as_value(&abstain), json!({"type": "decision", "decision": null}));
        assert_eq!(as_value(&ClientMessage::NextDuel), json!({"type": "next_duel"}));
    }

    #[test]
    fn decision_parses_exact_spellings_only() {
        assert_eq!("human".parse::<Decision>().unwrap(), Decision::Human);
        assert_eq!("ai".parse::<Decision>().unwrap(), Decision::Ai);
        assert!("Human".parse::<Decision>().is_err());
        assert!("robot".parse::<Decision>().is_err());
        assert!("".parse::<Decision>().is_err());
    }

    #[test]
    fn decision_display_matches_wire() {
        assert_eq!(Decision::Ai.to_string(), "ai");
        assert_eq!(Decision::Human.to_string(), "human");
    }
}

//! Server-side view of the wire protocol.
//!
//! Message types live in `ski-shared`; this module adds inbound frame parsing
//! with a typed error so the connection task can tell a broken frame from a
//! message kind it simply does not know.

use serde::Deserialize;
use thiserror::Error;

pub use ski_shared::protocol::*;
pub use ski_shared::vec3::{PlayerPosition, Vec3};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message kind `{0}`")]
    UnknownKind(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Parse one inbound text frame.
pub fn parse_client_msg(text: &str) -> Result<ClientMsg, ProtocolError> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(msg) => Ok(msg),
        Err(err) => match serde_json::from_str::<Envelope>(text) {
            Ok(envelope) if !ClientMsg::is_known_kind(&envelope.kind) => {
                Err(ProtocolError::UnknownKind(envelope.kind))
            }
            _ => Err(ProtocolError::Malformed(err)),
        },
    }
}

/// Serialize an outbound message to a JSON text frame.
pub fn encode_server_msg(msg: &ServerMsg) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(msg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_init() {
        match parse_client_msg(r#"{"type":"init","username":"Alice"}"#).unwrap() {
            ClientMsg::Init { username } => assert_eq!(username, "Alice"),
            other => panic!("Expected Init, got {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_is_distinguished() {
        let err = parse_client_msg(r#"{"type":"emote","name":"wave"}"#).unwrap_err();
        match err {
            ProtocolError::UnknownKind(kind) => assert_eq!(kind, "emote"),
            other => panic!("Expected UnknownKind, got {:?}", other),
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_client_msg("not valid json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn known_kind_with_bad_fields_is_malformed() {
        // `update` without a position
        assert!(matches!(
            parse_client_msg(r#"{"type":"update"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn encode_tags_outbound_messages() {
        let json = encode_server_msg(&ServerMsg::PlayerLeft(PlayerLeftMsg {
            id: "7".to_string(),
            username: Some("Bob".to_string()),
        }))
        .unwrap();
        assert!(json.contains("\"type\":\"player_left\""));
        assert!(json.contains("\"username\":\"Bob\""));
    }
}

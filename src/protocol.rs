//! Wire types for the AIcebreaker backend.
//!
//! Channel messages are JSON objects tagged by a `type` field. Older servers
//! push plain text of the form `Compteur: <n>` instead; [`parse_inbound`]
//! classifies both into an [`Inbound`] value without using a failed decode
//! as control flow.
//!
//! The request and response bodies of the one-shot HTTP endpoints live here
//! too, next to the messages they relate to.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

// ── Channel messages ────────────────────────────────────────────────

/// One entry of the roster pushed to the master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(rename = "wallet_address")]
    pub identity: Identity,
    #[serde(rename = "username", default)]
    pub display_name: String,
    #[serde(rename = "is_connected", default)]
    pub connected: bool,
}

/// Payload of a `game_result` message.
///
/// The server uses this tag for two shapes: the master's round result
/// (`value` only) and a player's analysed submission (everything else). All
/// fields are optional so both decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub emotions: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl GameResultPayload {
    /// The emotion with the highest score, if any were reported.
    pub fn top_emotion(&self) -> Option<(&str, f64)> {
        self.emotions
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(name, score)| (name.as_str(), *score))
    }
}

/// Structured messages pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One countdown tick.
    Countdown { value: i64 },
    /// The full roster of registered players. Sent to the master only.
    ClientsUpdate { clients: Vec<RosterEntry> },
    /// The master's chosen result, for observation.
    MasterResult {
        #[serde(default)]
        value: serde_json::Value,
    },
    /// A round result or a player's analysed submission, for observation.
    GameResult(GameResultPayload),
}

/// Classification of one raw channel payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A structured JSON message.
    Message(ServerMessage),
    /// A legacy `Compteur: <n>` text message.
    LegacyCountdown(i64),
    /// Anything else. Dropped silently by the dispatcher.
    Unrecognized,
}

static LEGACY_COUNTDOWN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Compteur: (\d+)").ok());

/// Classify a raw text payload received on the channel.
///
/// Payloads that are valid JSON are never matched against the legacy
/// pattern: valid JSON that is not a known message (unknown `type`, a
/// non-integer countdown `value`, a bare number) is [`Inbound::Unrecognized`].
pub fn parse_inbound(text: &str) -> Inbound {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => match serde_json::from_value::<ServerMessage>(value) {
            Ok(msg) => Inbound::Message(msg),
            Err(e) => {
                tracing::debug!("structured payload is not a known message: {e}");
                Inbound::Unrecognized
            }
        },
        Err(_) => parse_legacy(text),
    }
}

fn parse_legacy(text: &str) -> Inbound {
    let captured = LEGACY_COUNTDOWN
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok());
    match captured {
        Some(value) => Inbound::LegacyCountdown(value),
        None => Inbound::Unrecognized,
    }
}

// ── One-shot request bodies ─────────────────────────────────────────

/// Response of `GET /api/generate-client-id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientIdResponse {
    pub wallet_address: Identity,
}

/// Body of `POST /api/broadcast_countdown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownRequest {
    pub duration: u32,
}

/// Body of `POST /api/broadcast_game_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResultRequest {
    pub game_result: String,
}

/// Body of the speech synthesis endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub lang: String,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn countdown_message_decodes() {
        assert_eq!(
            parse_inbound(r#"{"type":"countdown","value":4}"#),
            Inbound::Message(ServerMessage::Countdown { value: 4 })
        );
    }

    #[test]
    fn legacy_text_decodes() {
        assert_eq!(parse_inbound("Compteur: 7"), Inbound::LegacyCountdown(7));
    }

    #[test]
    fn legacy_pattern_is_unanchored() {
        assert_eq!(
            parse_inbound("Serveur -> Compteur: 12 restant"),
            Inbound::LegacyCountdown(12)
        );
    }

    #[test]
    fn legacy_pattern_requires_digits() {
        assert_eq!(parse_inbound("Compteur: -3"), Inbound::Unrecognized);
        assert_eq!(parse_inbound("Compteur:5"), Inbound::Unrecognized);
    }

    #[test]
    fn legacy_overflow_is_unrecognized() {
        let huge = format!("Compteur: {}", "9".repeat(40));
        assert_eq!(parse_inbound(&huge), Inbound::Unrecognized);
    }

    #[test]
    fn plain_text_is_unrecognized() {
        assert_eq!(
            parse_inbound("Client #abc left the chat"),
            Inbound::Unrecognized
        );
        assert_eq!(parse_inbound(""), Inbound::Unrecognized);
    }

    #[test]
    fn valid_json_never_falls_back_to_legacy() {
        assert_eq!(parse_inbound(r#""Compteur: 5""#), Inbound::Unrecognized);
        assert_eq!(parse_inbound("5"), Inbound::Unrecognized);
    }

    #[test]
    fn non_integer_countdown_is_unrecognized() {
        assert_eq!(
            parse_inbound(r#"{"type":"countdown","value":"3"}"#),
            Inbound::Unrecognized
        );
        assert_eq!(
            parse_inbound(r#"{"type":"countdown","value":2.5}"#),
            Inbound::Unrecognized
        );
        assert_eq!(parse_inbound(r#"{"type":"countdown"}"#), Inbound::Unrecognized);
    }

    #[test]
    fn unknown_tag_is_unrecognized() {
        assert_eq!(
            parse_inbound(r#"{"type":"chat","text":"salut"}"#),
            Inbound::Unrecognized
        );
    }

    #[test]
    fn clients_update_maps_backend_field_names() {
        let text = r#"{"type":"clients_update","clients":[
            {"username":"alice","wallet_address":"rA","wallet_seed":"s","xrp_balance":10.0,"is_connected":true},
            {"username":"bob","wallet_address":"rB","is_connected":false}
        ]}"#;
        let Inbound::Message(ServerMessage::ClientsUpdate { clients }) = parse_inbound(text) else {
            panic!("expected clients_update");
        };
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].identity.as_str(), "rA");
        assert_eq!(clients[0].display_name, "alice");
        assert!(clients[0].connected);
        assert!(!clients[1].connected);
    }

    #[test]
    fn game_result_accepts_both_shapes() {
        let Inbound::Message(ServerMessage::GameResult(round)) =
            parse_inbound(r#"{"type":"game_result","value":"Feuille"}"#)
        else {
            panic!("expected game_result");
        };
        assert_eq!(round.value.as_deref(), Some("Feuille"));
        assert!(round.gesture.is_none());

        let text = r#"{"type":"game_result","wallet":"rA","username":"alice",
            "gesture":"pierre","emotions":{"happy":71.5,"sad":3.0},
            "emotion_score":64.2,"timestamp":"2025-05-01T10:00:00"}"#;
        let Inbound::Message(ServerMessage::GameResult(submission)) = parse_inbound(text) else {
            panic!("expected game_result");
        };
        assert_eq!(submission.username.as_deref(), Some("alice"));
        assert_eq!(submission.top_emotion(), Some(("happy", 71.5)));
    }

    #[test]
    fn master_result_keeps_raw_value() {
        assert_eq!(
            parse_inbound(r#"{"type":"master_result","value":2}"#),
            Inbound::Message(ServerMessage::MasterResult {
                value: serde_json::json!(2)
            })
        );
    }

    #[test]
    fn request_bodies_match_backend_schema() {
        let body = serde_json::to_value(CountdownRequest { duration: 5 }).unwrap();
        assert_eq!(body, serde_json::json!({ "duration": 5 }));
        let body = serde_json::to_value(GameResultRequest {
            game_result: "Pierre".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "game_result": "Pierre" }));
        let id: ClientIdResponse = serde_json::from_str(r#"{"wallet_address":"rNew"}"#).unwrap();
        assert_eq!(id.wallet_address.as_str(), "rNew");
    }
}

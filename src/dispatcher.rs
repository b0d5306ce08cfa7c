//! Applies classified channel payloads to the local round state.

use crate::outcome::Gesture;
use crate::protocol::{GameResultPayload, Inbound, RosterEntry, ServerMessage};

/// Local view of the game, updated only by the dispatcher and by explicit
/// restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundState {
    /// Current countdown value, `None` before the first tick of a round.
    pub countdown: Option<i64>,
    /// Last roster pushed by the server (master only).
    pub roster: Vec<RosterEntry>,
    /// Result chosen locally by the master for the current round.
    pub round_result: Option<Gesture>,
}

/// What a dispatched payload did.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The countdown was set to this value.
    Countdown(i64),
    /// The roster was replaced with this many entries.
    Roster(usize),
    /// A master result, forwarded for observation.
    MasterResult(serde_json::Value),
    /// A game result, forwarded for observation.
    GameResult(GameResultPayload),
    /// The payload was not recognized and was dropped.
    Ignored,
}

impl RoundState {
    /// Apply one classified payload.
    pub fn apply(&mut self, inbound: Inbound) -> Dispatch {
        match inbound {
            Inbound::Message(ServerMessage::Countdown { value }) | Inbound::LegacyCountdown(value) => {
                self.countdown = Some(value);
                Dispatch::Countdown(value)
            }
            Inbound::Message(ServerMessage::ClientsUpdate { clients }) => {
                let count = clients.len();
                self.roster = clients;
                Dispatch::Roster(count)
            }
            Inbound::Message(ServerMessage::MasterResult { value }) => {
                tracing::info!(%value, "master result received");
                Dispatch::MasterResult(value)
            }
            Inbound::Message(ServerMessage::GameResult(payload)) => {
                log_game_result(&payload);
                Dispatch::GameResult(payload)
            }
            Inbound::Unrecognized => Dispatch::Ignored,
        }
    }

    /// Start a new round at `start`, clearing the previous round's result.
    pub fn begin_round(&mut self, start: i64) {
        self.round_result = None;
        self.countdown = Some(start);
    }
}

fn log_game_result(payload: &GameResultPayload) {
    match (&payload.username, &payload.gesture) {
        (Some(username), Some(gesture)) => {
            tracing::info!(
                username = %username,
                wallet = payload.wallet.as_deref().unwrap_or("-"),
                gesture = %gesture,
                timestamp = payload.timestamp.as_deref().unwrap_or("-"),
                "player result received"
            );
            if let Some((emotion, score)) = payload.top_emotion() {
                tracing::info!("top emotion of {username}: {emotion} ({}%)", score.round());
            }
            if let Some(score) = payload.emotion_score {
                tracing::info!("overall emotion score: {}%", score.round());
            }
        }
        _ => {
            tracing::info!(
                value = payload.value.as_deref().unwrap_or("-"),
                "round result received"
            );
        }
    }
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
    use crate::identity::Identity;
    use crate::protocol::parse_inbound;

    fn entry(id: &str, name: &str, connected: bool) -> RosterEntry {
        RosterEntry {
            identity: Identity::new(id),
            display_name: name.into(),
            connected,
        }
    }

    #[test]
    fn structured_countdown_sets_value() {
        let mut state = RoundState::default();
        for v in [9, 4, 0, 12] {
            let text = format!(r#"{{"type":"countdown","value":{v}}}"#);
            assert_eq!(state.apply(parse_inbound(&text)), Dispatch::Countdown(v));
            assert_eq!(state.countdown, Some(v));
        }
    }

    #[test]
    fn legacy_countdown_sets_value() {
        let mut state = RoundState::default();
        state.apply(parse_inbound("Compteur: 7"));
        assert_eq!(state.countdown, Some(7));
    }

    #[test]
    fn unrecognized_payload_changes_nothing() {
        let mut state = RoundState {
            countdown: Some(3),
            roster: vec![entry("rA", "alice", true)],
            round_result: Some(Gesture::Feuille),
        };
        let before = state.clone();
        for text in ["hello", "{not json", r#"{"type":"chat"}"#, "Compteur: x"] {
            assert_eq!(state.apply(parse_inbound(text)), Dispatch::Ignored);
        }
        assert_eq!(state, before);
    }

    #[test]
    fn roster_update_replaces_instead_of_merging() {
        let mut state = RoundState::default();
        state.apply(Inbound::Message(ServerMessage::ClientsUpdate {
            clients: vec![entry("rA", "alice", true), entry("rB", "bob", true)],
        }));
        let dispatched = state.apply(Inbound::Message(ServerMessage::ClientsUpdate {
            clients: vec![entry("rC", "carol", false)],
        }));
        assert_eq!(dispatched, Dispatch::Roster(1));
        assert_eq!(state.roster, vec![entry("rC", "carol", false)]);
    }

    #[test]
    fn empty_roster_update_clears_roster() {
        let mut state = RoundState {
            roster: vec![entry("rA", "alice", true)],
            ..Default::default()
        };
        state.apply(parse_inbound(r#"{"type":"clients_update","clients":[]}"#));
        assert!(state.roster.is_empty());
    }

    #[test]
    fn observational_messages_do_not_touch_game_state() {
        let mut state = RoundState {
            countdown: Some(0),
            ..Default::default()
        };
        let before = state.clone();
        let dispatched = state.apply(parse_inbound(r#"{"type":"game_result","value":"Pierre"}"#));
        assert!(matches!(dispatched, Dispatch::GameResult(_)));
        let dispatched = state.apply(parse_inbound(r#"{"type":"master_result","value":1}"#));
        assert_eq!(dispatched, Dispatch::MasterResult(serde_json::json!(1)));
        assert_eq!(state, before);
    }

    #[test]
    fn begin_round_clears_result() {
        let mut state = RoundState {
            countdown: Some(0),
            round_result: Some(Gesture::Pierre),
            ..Default::default()
        };
        state.begin_round(5);
        assert_eq!(state.countdown, Some(5));
        assert!(state.round_result.is_none());
    }
}

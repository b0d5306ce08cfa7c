//! Events emitted to the application embedding a session.

use crate::identity::Identity;
use crate::outcome::Gesture;
use crate::protocol::{GameResultPayload, RosterEntry};

/// Something the application may want to render or log.
///
/// Events arrive on the bounded receiver returned when a channel or session
/// starts. `Disconnected` is always the last event of a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The player identity request completed.
    IdentityAssigned { identity: Identity },
    /// The player identity request failed. No channel will be opened.
    IdentityFailed { reason: String },
    /// The channel is open.
    Connected,
    /// The countdown changed, either from the server or from a local restart.
    /// `None` means the countdown was cleared.
    CountdownChanged { value: Option<i64> },
    /// The roster was replaced.
    RosterUpdated { clients: Vec<RosterEntry> },
    /// A `master_result` message was received.
    MasterResult { value: serde_json::Value },
    /// A `game_result` message was received.
    GameResult(Box<GameResultPayload>),
    /// The master chose this round's result. It is kept locally even if the
    /// broadcast request fails.
    RoundResultChosen { gesture: Gesture },
    /// The backend acknowledged this player's automatic submission.
    ResponseSubmitted { ack: serde_json::Value },
    /// The channel is closed and will not be reopened.
    Disconnected { reason: Option<String> },
}

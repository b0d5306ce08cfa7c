//! Gestures and the round outcome resolver.

use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// One of the three gestures of pierre-feuille-ciseau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gesture {
    Pierre,
    Feuille,
    Ciseau,
}

impl Gesture {
    pub const ALL: [Gesture; 3] = [Gesture::Pierre, Gesture::Feuille, Gesture::Ciseau];

    /// Pick a gesture uniformly at random.
    pub fn random() -> Self {
        Self::ALL
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(Gesture::Pierre)
    }

    /// The gesture this one beats.
    pub fn beats(self) -> Gesture {
        match self {
            Gesture::Ciseau => Gesture::Feuille,
            Gesture::Feuille => Gesture::Pierre,
            Gesture::Pierre => Gesture::Ciseau,
        }
    }

    /// Canonical lowercase name, the form [`resolve`] accepts.
    pub fn as_str(self) -> &'static str {
        match self {
            Gesture::Pierre => "pierre",
            Gesture::Feuille => "feuille",
            Gesture::Ciseau => "ciseau",
        }
    }

    /// Label the master broadcasts as the round result.
    pub fn broadcast_label(self) -> &'static str {
        match self {
            Gesture::Pierre => "Pierre",
            Gesture::Feuille => "Feuille",
            Gesture::Ciseau => "Ciseaux",
        }
    }

    /// Parse a broadcast label back into a gesture.
    ///
    /// Unlike [`FromStr`], this accepts the plural `Ciseaux` the master sends.
    pub fn from_broadcast_label(label: &str) -> Option<Gesture> {
        let label = normalize(label);
        Self::ALL
            .into_iter()
            .find(|g| g.broadcast_label().to_lowercase() == label || g.as_str() == label)
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGesture(pub String);

impl fmt::Display for UnknownGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown gesture: {:?}", self.0)
    }
}

impl std::error::Error for UnknownGesture {}

impl FromStr for Gesture {
    type Err = UnknownGesture;

    /// Case- and whitespace-insensitive. Only the three canonical names
    /// parse; see [`Gesture::from_broadcast_label`] for the master's labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pierre" => Ok(Gesture::Pierre),
            "feuille" => Ok(Gesture::Feuille),
            "ciseau" => Ok(Gesture::Ciseau),
            _ => Err(UnknownGesture(s.to_string())),
        }
    }
}

/// Categorical outcome of a player gesture against the master result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Win,
    Loss,
    /// Never returned by [`resolve`]: identical gestures count as a win.
    Tie,
    Invalid,
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Compare the player's gesture with the master's result.
///
/// Both inputs are trimmed and lowercased. Identical inputs resolve to
/// [`Verdict::Win`], even when they do not name a gesture.
pub fn resolve(player: &str, master: &str) -> Verdict {
    if normalize(player) == normalize(master) {
        return Verdict::Win;
    }
    match (player.parse::<Gesture>(), master.parse::<Gesture>()) {
        (Ok(p), Ok(m)) if p == m => Verdict::Win,
        (Ok(p), Ok(m)) if p.beats() == m => Verdict::Win,
        (Ok(_), Ok(_)) => Verdict::Loss,
        _ => Verdict::Invalid,
    }
}

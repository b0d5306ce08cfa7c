//! Countdown reactor: fires cues and round effects once per value transition.
//!
//! The reactor is a small state machine over the observed countdown value:
//!
//! ```text
//! Unset ──> Counting(N) ──> … ──> Counting(1) ──> Zero ──> Unset
//! ```
//!
//! Each observation is compared with the previously observed value. Effects
//! for a value only fire when it differs from the previous one, so a server
//! pushing the same tick twice cannot trigger a second submission. The
//! previous value is replaced after every observation, including unset.

/// Which side of the game the reactor runs on. Decides the zero effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Submits the player's response at zero.
    Player,
    /// Chooses and broadcasts the round result at zero.
    Master,
}

/// A spoken announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Entering 3, 2 or 1.
    Count(i64),
    /// Entering 0.
    Go,
}

impl Cue {
    /// Text handed to speech synthesis.
    pub fn text(self) -> String {
        match self {
            Cue::Count(n) => n.to_string(),
            Cue::Go => "Ciseaux!".to_string(),
        }
    }
}

/// Side effect requested by the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Speak(Cue),
    /// Player side: submit the response for this round.
    SubmitResponse,
    /// Master side: choose the round result and broadcast it.
    BroadcastResult,
}

/// Where the reactor is in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unset,
    Counting(i64),
    Zero,
}

#[derive(Debug, Clone)]
pub struct CountdownReactor {
    side: Side,
    spoken_cues: bool,
    previous: Option<i64>,
}

impl CountdownReactor {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            spoken_cues: true,
            previous: None,
        }
    }

    /// Enable or disable [`Effect::Speak`]. Round effects always fire.
    #[must_use]
    pub fn with_spoken_cues(mut self, enabled: bool) -> Self {
        self.spoken_cues = enabled;
        self
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// The last observed value.
    pub fn previous(&self) -> Option<i64> {
        self.previous
    }

    pub fn phase(&self) -> Phase {
        match self.previous {
            None => Phase::Unset,
            Some(0) => Phase::Zero,
            Some(n) => Phase::Counting(n),
        }
    }

    /// Record a newly observed countdown value and return the effects to run,
    /// in order.
    pub fn observe(&mut self, current: Option<i64>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(value) = current {
            if self.previous != Some(value) {
                self.effects_for(value, &mut effects);
            }
        }
        self.previous = current;
        effects
    }

    fn effects_for(&self, value: i64, effects: &mut Vec<Effect>) {
        match value {
            1..=3 => {
                if self.spoken_cues {
                    effects.push(Effect::Speak(Cue::Count(value)));
                }
            }
            0 => {
                if self.spoken_cues {
                    effects.push(Effect::Speak(Cue::Go));
                }
                effects.push(match self.side {
                    Side::Player => Effect::SubmitResponse,
                    Side::Master => Effect::BroadcastResult,
                });
            }
            _ => {}
        }
    }
}

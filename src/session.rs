//! Player and master sessions.
//!
//! A session owns everything one page of the game holds for its lifetime:
//! the identity (players only), at most one open [`ChannelClient`], and the
//! injected [`Backend`] and [`AudioSink`]. Sessions absorb request and
//! connection failures by logging them and reporting them as [`GameEvent`]s;
//! the caller never has to handle a network error to keep the game running.
//!
//! Both sessions share one event receiver across every channel they open, so
//! switching identity does not require re-subscribing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::audio::AudioSink;
use crate::client::{announce, emit_event, ChannelClient, RoundServices};
use crate::config::ClientConfig;
use crate::error::{AicebreakerError, Result};
use crate::event::GameEvent;
use crate::identity::{ChannelRole, Identity, IdentityState};
use crate::outcome::Gesture;
use crate::protocol::RosterEntry;
use crate::transport::Connector;

/// First announcement when the master starts a round.
pub const INTRO_ANNOUNCEMENT: &str = "Attention! Le jeu commence !";
/// Second announcement, after [`ClientConfig::intro_delay`].
pub const READY_ANNOUNCEMENT: &str = "Préparez-vous!";

/// Open a channel for `role`, reporting a failed connect as `Disconnected`.
async fn open_channel<C: Connector>(
    connector: &C,
    role: ChannelRole,
    services: &RoundServices,
    config: &ClientConfig,
    event_tx: &mpsc::Sender<GameEvent>,
) -> Option<ChannelClient> {
    let url = config.channel_url(&role);
    match connector.connect(&url).await {
        Ok(transport) => {
            info!(url = %url, "channel opened");
            Some(ChannelClient::start_with_events(
                transport,
                role,
                services.clone(),
                config,
                event_tx.clone(),
            ))
        }
        Err(e) => {
            warn!(url = %url, "channel connect failed: {e}");
            emit_event(
                event_tx,
                GameEvent::Disconnected {
                    reason: Some(e.to_string()),
                },
            )
            .await;
            None
        }
    }
}

async fn close_channel(channel: Option<ChannelClient>) {
    if let Some(mut channel) = channel {
        channel.shutdown().await;
    }
}

// ── Player ──────────────────────────────────────────────────────────

/// A player's view of the game: one identity, one channel scoped by it.
pub struct PlayerSession<C: Connector> {
    config: ClientConfig,
    services: RoundServices,
    connector: C,
    identity: IdentityState,
    channel: Option<ChannelClient>,
    event_tx: mpsc::Sender<GameEvent>,
}

impl<C: Connector> PlayerSession<C> {
    /// Fetch an identity and, if that succeeds, open the player's channel.
    ///
    /// Exactly one identity request is made. If it fails the session stays in
    /// [`IdentityState::Failed`] with no channel; nothing is retried.
    #[must_use = "the event receiver must be used to receive events"]
    pub async fn mount(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        connector: C,
        audio: Arc<dyn AudioSink>,
    ) -> (Self, mpsc::Receiver<GameEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let mut session = Self {
            config,
            services: RoundServices::new(backend, audio),
            connector,
            identity: IdentityState::Loading,
            channel: None,
            event_tx,
        };

        match session.services.backend.generate_client_id().await {
            Ok(identity) => {
                info!(identity = %identity, "identity assigned");
                session.assign(identity).await;
            }
            Err(e) => {
                error!("identity request failed: {e}");
                session.identity = IdentityState::Failed;
                emit_event(
                    &session.event_tx,
                    GameEvent::IdentityFailed {
                        reason: e.to_string(),
                    },
                )
                .await;
            }
        }

        (session, event_rx)
    }

    /// Replace the identity, closing the old channel before the new one opens.
    pub async fn switch_identity(&mut self, identity: Identity) {
        if self.identity.identity() == Some(&identity) {
            debug!(identity = %identity, "identity unchanged");
            return;
        }
        close_channel(self.channel.take()).await;
        self.assign(identity).await;
    }

    async fn assign(&mut self, identity: Identity) {
        self.identity = IdentityState::Ready(identity.clone());
        emit_event(
            &self.event_tx,
            GameEvent::IdentityAssigned {
                identity: identity.clone(),
            },
        )
        .await;
        self.channel = open_channel(
            &self.connector,
            ChannelRole::Player(identity),
            &self.services,
            &self.config,
            &self.event_tx,
        )
        .await;
    }

    /// Close the channel. Safe to call whatever the connection state.
    pub async fn unmount(&mut self) {
        debug!("player session unmounting");
        close_channel(self.channel.take()).await;
    }

    pub fn identity_state(&self) -> &IdentityState {
        &self.identity
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.identity()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(ChannelClient::is_connected)
    }

    pub async fn countdown(&self) -> Option<i64> {
        match &self.channel {
            Some(channel) => channel.countdown().await,
            None => None,
        }
    }

    pub async fn roster(&self) -> Vec<RosterEntry> {
        match &self.channel {
            Some(channel) => channel.roster().await,
            None => Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl<C: Connector> std::fmt::Debug for PlayerSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerSession")
            .field("identity", &self.identity)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

// ── Master ──────────────────────────────────────────────────────────

/// The master's view: the manager channel, the roster and the round result.
pub struct MasterSession {
    config: ClientConfig,
    services: RoundServices,
    channel: Option<ChannelClient>,
    countdown_start: u32,
    starting: AtomicBool,
}

/// Clears the master's pending-start flag when a start attempt ends.
struct PendingStart<'a>(&'a AtomicBool);

impl Drop for PendingStart<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MasterSession {
    /// Open the manager channel. A failed connect leaves the session
    /// disconnected and unable to start rounds.
    #[must_use = "the event receiver must be used to receive events"]
    pub async fn mount<C: Connector>(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        connector: C,
        audio: Arc<dyn AudioSink>,
    ) -> (Self, mpsc::Receiver<GameEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let services = RoundServices::new(backend, audio);
        let channel = open_channel(
            &connector,
            ChannelRole::Manager,
            &services,
            &config,
            &event_tx,
        )
        .await;
        let session = Self {
            countdown_start: config.countdown_start.max(1),
            config,
            services,
            channel,
            starting: AtomicBool::new(false),
        };
        (session, event_rx)
    }

    /// Start a round.
    ///
    /// Clears the previous result and shows the start value locally, plays
    /// the two announcements [`ClientConfig::intro_delay`] apart, then asks
    /// the backend to broadcast the countdown. Returns the backend's ack.
    ///
    /// # Errors
    ///
    /// Refuses to start, without sending anything, while another start is
    /// pending ([`AicebreakerError::StartPending`]), without an open manager
    /// channel ([`AicebreakerError::NotConnected`]) or while the countdown
    /// shows anything but 0 ([`AicebreakerError::RoundInProgress`]).
    /// Otherwise returns the broadcast request's error; local state is not
    /// rolled back.
    pub async fn start_countdown(&self) -> Result<serde_json::Value> {
        if self.starting.swap(true, Ordering::AcqRel) {
            debug!("round start already pending");
            return Err(AicebreakerError::StartPending);
        }
        let _pending = PendingStart(&self.starting);

        let channel = match &self.channel {
            Some(channel) if channel.is_connected() => channel,
            _ => {
                debug!("no manager channel, round not started");
                return Err(AicebreakerError::NotConnected);
            }
        };
        if let Some(value) = channel.countdown().await.filter(|v| *v != 0) {
            debug!(countdown = value, "round still running, not restarting");
            return Err(AicebreakerError::RoundInProgress(value));
        }

        let start = self.countdown_start;
        channel.begin_round(i64::from(start))?;

        let engine = self.config.speech_engine;
        let lang = self.config.speech_lang.as_str();
        tokio::join!(
            announce(&self.services, engine, lang, INTRO_ANNOUNCEMENT),
            tokio::time::sleep(self.config.intro_delay),
        );
        let (_, broadcast) = tokio::join!(
            announce(&self.services, engine, lang, READY_ANNOUNCEMENT),
            self.services.backend.broadcast_countdown(start),
        );

        match broadcast {
            Ok(ack) => {
                info!(duration = start, %ack, "countdown started");
                Ok(ack)
            }
            Err(e) => {
                warn!(duration = start, "countdown broadcast failed: {e}");
                Err(e)
            }
        }
    }

    /// Change the start value of the next round and clear the countdown.
    /// Values below 1 are clamped to 1.
    pub fn edit_countdown_start(&mut self, start: u32) {
        self.countdown_start = start.max(1);
        if let Some(channel) = &self.channel {
            if let Err(e) = channel.set_countdown(None) {
                debug!("countdown clear skipped: {e}");
            }
        }
    }

    /// [`edit_countdown_start`](Self::edit_countdown_start) from free text.
    /// Anything that is not a number counts as 0, and is clamped to 1.
    pub fn edit_countdown_start_text(&mut self, input: &str) {
        self.edit_countdown_start(parse_countdown_start(input));
    }

    /// Close the manager channel. Safe to call whatever the connection state.
    pub async fn unmount(&mut self) {
        debug!("master session unmounting");
        close_channel(self.channel.take()).await;
    }

    pub fn countdown_start(&self) -> u32 {
        self.countdown_start
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(ChannelClient::is_connected)
    }

    pub async fn countdown(&self) -> Option<i64> {
        match &self.channel {
            Some(channel) => channel.countdown().await,
            None => None,
        }
    }

    pub async fn roster(&self) -> Vec<RosterEntry> {
        match &self.channel {
            Some(channel) => channel.roster().await,
            None => Vec::new(),
        }
    }

    pub async fn round_result(&self) -> Option<Gesture> {
        match &self.channel {
            Some(channel) => channel.round_result().await,
            None => None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for MasterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSession")
            .field("countdown_start", &self.countdown_start)
            .field("starting", &self.starting.load(Ordering::Relaxed))
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Parse a countdown start typed by the master: an optional sign, then
/// leading digits; 0 if there are none, never below 1. Values too large for
/// a `u32` saturate.
pub fn parse_countdown_start(input: &str) -> u32 {
    let trimmed = input.trim_start();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .map_or(unsigned, |end| unsigned.get(..end).unwrap_or_default());
    if negative || digits.is_empty() {
        return 1;
    }
    digits.parse::<u32>().unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn parse_countdown_start_reads_leading_digits() {
        assert_eq!(parse_countdown_start("7"), 7);
        assert_eq!(parse_countdown_start(" 12s"), 12);
        assert_eq!(parse_countdown_start("10.5"), 10);
    }

    #[test]
    fn parse_countdown_start_clamps_to_one() {
        assert_eq!(parse_countdown_start(""), 1);
        assert_eq!(parse_countdown_start("abc"), 1);
        assert_eq!(parse_countdown_start("0"), 1);
        assert_eq!(parse_countdown_start("-3"), 1);
        assert_eq!(parse_countdown_start("-"), 1);
    }

    #[test]
    fn parse_countdown_start_accepts_plus_sign() {
        assert_eq!(parse_countdown_start("+5"), 5);
        assert_eq!(parse_countdown_start("  +12 ticks"), 12);
        assert_eq!(parse_countdown_start("+"), 1);
        assert_eq!(parse_countdown_start("++5"), 1);
    }

    #[test]
    fn parse_countdown_start_saturates_on_overflow() {
        assert_eq!(parse_countdown_start("99999999999"), u32::MAX);
        assert_eq!(parse_countdown_start("4294967295"), u32::MAX);
        assert_eq!(parse_countdown_start("4294967294"), u32::MAX - 1);
    }
}

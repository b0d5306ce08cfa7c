//! Async channel client for the AIcebreaker game.
//!
//! [`ChannelClient`] is a thin handle around a background transport loop
//! task. The loop owns the transport, the [`CountdownReactor`] and every
//! in-flight effect request; the handle only reads shared state and queues
//! local commands. Events are emitted on a bounded channel
//! ([`tokio::sync::mpsc::Receiver<GameEvent>`]) returned from
//! [`ChannelClient::start`].
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect(&config.channel_url(&role)).await?;
//! let services = RoundServices::new(Arc::new(HttpBackend::new(&config)), Arc::new(SilentAudio));
//! let (mut client, mut events) = ChannelClient::start(transport, role, services, &config);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         GameEvent::CountdownChanged { value } => { /* … */ }
//!         GameEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! client.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::audio::AudioSink;
use crate::config::{ClientConfig, ResponsePayload, SpeechEngine};
use crate::dispatcher::{Dispatch, RoundState};
use crate::error::{AicebreakerError, Result};
use crate::event::GameEvent;
use crate::identity::ChannelRole;
use crate::outcome::Gesture;
use crate::protocol::{parse_inbound, RosterEntry};
use crate::reactor::{Cue, CountdownReactor, Effect, Side};
use crate::transport::Transport;

// ── Injected services ───────────────────────────────────────────────

/// Resources a channel uses to carry out reactor effects.
///
/// Owned by the session that mounts the channel and shared with the
/// transport loop for the channel's lifetime.
#[derive(Clone)]
pub struct RoundServices {
    pub backend: Arc<dyn Backend>,
    pub audio: Arc<dyn AudioSink>,
}

impl RoundServices {
    pub fn new(backend: Arc<dyn Backend>, audio: Arc<dyn AudioSink>) -> Self {
        Self { backend, audio }
    }
}

impl std::fmt::Debug for RoundServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundServices").finish_non_exhaustive()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Local mutations requested through the handle.
#[derive(Debug)]
enum Command {
    SetCountdown(Option<i64>),
    BeginRound(i64),
}

/// State shared between the client handle and the transport loop.
struct ChannelState {
    connected: AtomicBool,
    round: Mutex<RoundState>,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            round: Mutex::new(RoundState::default()),
        }
    }
}

/// Everything an effect task needs, cloned into each task as one `Arc`.
struct EffectContext {
    role: ChannelRole,
    services: RoundServices,
    speech_engine: SpeechEngine,
    speech_lang: String,
    response: ResponsePayload,
    state: Arc<ChannelState>,
    event_tx: mpsc::Sender<GameEvent>,
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to one open game channel.
///
/// Created via [`ChannelClient::start`], which spawns the transport loop and
/// returns this handle with an event receiver. Dropping the handle aborts the
/// loop; [`shutdown`](Self::shutdown) closes the transport gracefully.
pub struct ChannelClient {
    role: ChannelRole,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<ChannelState>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
}

impl ChannelClient {
    /// Start the transport loop over an open `transport`.
    ///
    /// The reactor side follows `role`: a player channel submits a response
    /// at zero, the manager channel broadcasts the round result.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        role: ChannelRole,
        services: RoundServices,
        config: &ClientConfig,
    ) -> (Self, mpsc::Receiver<GameEvent>) {
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<GameEvent>(capacity);
        let client = Self::start_with_events(transport, role, services, config, event_tx);
        (client, event_rx)
    }

    /// Start the transport loop, emitting on an existing event sender.
    ///
    /// Sessions use this so one receiver outlives successive channels.
    pub(crate) fn start_with_events(
        transport: impl Transport,
        role: ChannelRole,
        services: RoundServices,
        config: &ClientConfig,
        event_tx: mpsc::Sender<GameEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ChannelState::new());
        let side = if role.is_manager() {
            Side::Master
        } else {
            Side::Player
        };
        let reactor = CountdownReactor::new(side).with_spoken_cues(config.spoken_cues);

        let ctx = Arc::new(EffectContext {
            role: role.clone(),
            services,
            speech_engine: config.speech_engine,
            speech_lang: config.speech_lang.clone(),
            response: config.response.clone(),
            state: Arc::clone(&state),
            event_tx,
        });

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            ctx,
            reactor,
            shutdown_rx,
            config.shutdown_timeout,
        ));

        Self {
            role,
            cmd_tx,
            state,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    // ── Local commands ──────────────────────────────────────────────

    /// Set the countdown locally, as if the server had pushed it. `None`
    /// clears it and re-arms the reactor.
    ///
    /// # Errors
    ///
    /// Returns [`AicebreakerError::NotConnected`] if the channel has closed.
    pub fn set_countdown(&self, value: Option<i64>) -> Result<()> {
        self.send(Command::SetCountdown(value))
    }

    /// Clear the previous round's result and show `start` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AicebreakerError::NotConnected`] if the channel has closed.
    pub fn begin_round(&self, start: i64) -> Result<()> {
        self.send(Command::BeginRound(start))
    }

    /// Close the transport and stop the background task.
    ///
    /// In-flight effect requests are aborted. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        debug!(role = ?self.role, "ChannelClient: shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // If the loop does not exit in time, abort it so it cannot run on
        // detached.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn role(&self) -> &ChannelRole {
        &self.role
    }

    /// Returns `true` while the channel is open.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    pub async fn countdown(&self) -> Option<i64> {
        self.state.round.lock().await.countdown
    }

    pub async fn roster(&self) -> Vec<RosterEntry> {
        self.state.round.lock().await.roster.clone()
    }

    pub async fn round_result(&self) -> Option<Gesture> {
        self.state.round.lock().await.round_result
    }

    /// Snapshot of the whole local round state.
    pub async fn round_state(&self) -> RoundState {
        self.state.round.lock().await.clone()
    }

    fn send(&self, cmd: Command) -> Result<()> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(AicebreakerError::NotConnected);
        }
        self.cmd_tx
            .send(cmd)
            .map_err(|_| AicebreakerError::NotConnected)
    }
}

impl std::fmt::Debug for ChannelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelClient")
            .field("role", &self.role)
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        // No executor is available to drive an async close here. Aborting the
        // task drops the transport, which releases the connection.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background loop multiplexing commands, shutdown, inbound messages and
/// effect completion via `tokio::select!`.
///
/// Exits when the handle shuts down or is dropped, when the server closes
/// the channel, or on a receive error. The transport is closed on every
/// exit path.
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    ctx: Arc<EffectContext>,
    mut reactor: CountdownReactor,
    mut shutdown_rx: oneshot::Receiver<()>,
    drain_timeout: Duration,
) {
    debug!(role = ?ctx.role, "transport loop started");
    emit_event(&ctx.event_tx, GameEvent::Connected).await;

    let mut effects: JoinSet<()> = JoinSet::new();

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => apply_command(&ctx, &mut reactor, &mut effects, cmd).await,
                    None => {
                        debug!("command channel closed, shutting down transport loop");
                        effects.abort_all();
                        break Some("client shut down".to_string());
                    }
                }
            }

            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                effects.abort_all();
                break Some("client shut down".to_string());
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => handle_payload(&ctx, &mut reactor, &mut effects, &text).await,
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        drain_effects(&mut effects, drain_timeout).await;
                        break Some(format!("transport receive error: {e}"));
                    }
                    None => {
                        debug!("transport closed by server");
                        drain_effects(&mut effects, drain_timeout).await;
                        break None;
                    }
                }
            }

            Some(joined) = effects.join_next(), if !effects.is_empty() => {
                if let Err(e) = joined {
                    if !e.is_cancelled() {
                        warn!("effect task failed: {e}");
                    }
                }
            }
        }
    };

    if let Err(e) = transport.close().await {
        debug!("transport close failed: {e}");
    }
    emit_disconnected(&ctx.event_tx, &ctx.state, reason).await;

    debug!("transport loop exited");
}

/// Let in-flight effects finish after the server closed the channel.
async fn drain_effects(effects: &mut JoinSet<()>, timeout: Duration) {
    if effects.is_empty() {
        return;
    }
    debug!(pending = effects.len(), "waiting for in-flight effects");
    let drained = tokio::time::timeout(timeout, async {
        while effects.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("in-flight effects did not finish in time; aborting");
        effects.abort_all();
    }
}

async fn apply_command(
    ctx: &Arc<EffectContext>,
    reactor: &mut CountdownReactor,
    effects: &mut JoinSet<()>,
    cmd: Command,
) {
    let value = {
        let mut round = ctx.state.round.lock().await;
        match cmd {
            Command::SetCountdown(value) => round.countdown = value,
            Command::BeginRound(start) => round.begin_round(start),
        }
        round.countdown
    };
    debug!(?value, "state: local countdown restart");
    emit_event(&ctx.event_tx, GameEvent::CountdownChanged { value }).await;
    react(ctx, reactor, effects, value).await;
}

async fn handle_payload(
    ctx: &Arc<EffectContext>,
    reactor: &mut CountdownReactor,
    effects: &mut JoinSet<()>,
    text: &str,
) {
    let (dispatched, roster) = {
        let mut round = ctx.state.round.lock().await;
        let dispatched = round.apply(parse_inbound(text));
        let roster = matches!(dispatched, Dispatch::Roster(_)).then(|| round.roster.clone());
        (dispatched, roster)
    };

    match dispatched {
        Dispatch::Countdown(value) => {
            debug!(value, "state: countdown");
            emit_event(&ctx.event_tx, GameEvent::CountdownChanged { value: Some(value) }).await;
            react(ctx, reactor, effects, Some(value)).await;
        }
        Dispatch::Roster(count) => {
            debug!(count, "state: roster replaced");
            let clients = roster.unwrap_or_default();
            emit_event(&ctx.event_tx, GameEvent::RosterUpdated { clients }).await;
        }
        Dispatch::MasterResult(value) => {
            emit_event(&ctx.event_tx, GameEvent::MasterResult { value }).await;
        }
        Dispatch::GameResult(payload) => {
            emit_event(&ctx.event_tx, GameEvent::GameResult(Box::new(payload))).await;
        }
        Dispatch::Ignored => {
            debug!("ignoring unrecognized payload: {text}");
        }
    }
}

/// Feed an observed value to the reactor and start the resulting effects.
async fn react(
    ctx: &Arc<EffectContext>,
    reactor: &mut CountdownReactor,
    effects: &mut JoinSet<()>,
    value: Option<i64>,
) {
    for effect in reactor.observe(value) {
        match effect {
            Effect::Speak(cue) => {
                let ctx = Arc::clone(ctx);
                effects.spawn(async move { speak(&ctx, cue).await });
            }
            Effect::SubmitResponse => {
                let ctx = Arc::clone(ctx);
                effects.spawn(async move { submit_response(&ctx).await });
            }
            Effect::BroadcastResult => {
                // The local result is kept even if the broadcast fails.
                let gesture = Gesture::random();
                ctx.state.round.lock().await.round_result = Some(gesture);
                info!(%gesture, "round result chosen");
                emit_event(&ctx.event_tx, GameEvent::RoundResultChosen { gesture }).await;
                let ctx = Arc::clone(ctx);
                effects.spawn(async move { broadcast_result(&ctx, gesture).await });
            }
        }
    }
}

// ── Effects ─────────────────────────────────────────────────────────

async fn speak(ctx: &EffectContext, cue: Cue) {
    announce(&ctx.services, ctx.speech_engine, &ctx.speech_lang, &cue.text()).await;
}

/// Synthesize `text` and play it on the session's audio sink. Failures are
/// logged and absorbed.
pub(crate) async fn announce(
    services: &RoundServices,
    engine: SpeechEngine,
    lang: &str,
    text: &str,
) {
    let clip = match services.backend.synthesize_speech(text, lang, engine).await {
        Ok(clip) => clip,
        Err(e) => {
            warn!(text, "speech synthesis failed: {e}");
            return;
        }
    };
    if let Err(e) = services.audio.play(text, clip).await {
        warn!(text, "audio playback failed: {e}");
    }
}

async fn submit_response(ctx: &EffectContext) {
    let ChannelRole::Player(identity) = &ctx.role else {
        warn!("manager channel cannot submit a player response");
        return;
    };
    match ctx
        .services
        .backend
        .submit_countdown_response(identity, &ctx.response)
        .await
    {
        Ok(ack) => {
            info!(identity = %identity, %ack, "countdown response submitted");
            emit_event(&ctx.event_tx, GameEvent::ResponseSubmitted { ack }).await;
        }
        Err(e) => warn!(identity = %identity, "countdown response failed: {e}"),
    }
}

async fn broadcast_result(ctx: &EffectContext, gesture: Gesture) {
    match ctx
        .services
        .backend
        .broadcast_game_result(gesture.broadcast_label())
        .await
    {
        Ok(ack) => info!(%gesture, %ack, "game result broadcast"),
        Err(e) => warn!(%gesture, "game result broadcast failed: {e}"),
    }
}

// ── Event helpers ───────────────────────────────────────────────────

/// Emit an event. If the channel is full, log a warning and drop the event
/// so the transport loop never blocks.
pub(crate) async fn emit_event(event_tx: &mpsc::Sender<GameEvent>, event: GameEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit [`GameEvent::Disconnected`] and clear the connected flag.
///
/// Uses `send().await` because `Disconnected` is the last event of a channel
/// and must never be dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<GameEvent>,
    state: &ChannelState,
    reason: Option<String>,
) {
    state.connected.store(false, Ordering::Release);
    let event = GameEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::audio::SilentAudio;
    use crate::identity::Identity;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mocks ───────────────────────────────────────────────────────

    /// Replays scripted payloads, then hangs until shutdown.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, AicebreakerError>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, AicebreakerError>>>,
        ) -> (Self, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: VecDeque::from(incoming),
                closed: Arc::clone(&closed),
            };
            (transport, closed)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn recv(&mut self) -> Option<std::result::Result<String, AicebreakerError>> {
            if let Some(item) = self.incoming.pop_front() {
                item
            } else {
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), AicebreakerError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Records every request and answers with a fixed ack.
    #[derive(Default)]
    struct RecordingBackend {
        calls: StdMutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        async fn generate_client_id(&self) -> Result<Identity> {
            self.record("generate_client_id".into());
            Ok(Identity::new("rTest"))
        }

        async fn submit_countdown_response(
            &self,
            identity: &Identity,
            _response: &ResponsePayload,
        ) -> Result<serde_json::Value> {
            self.record(format!("submit:{identity}"));
            Ok(serde_json::json!({ "status": "success" }))
        }

        async fn broadcast_countdown(&self, duration: u32) -> Result<serde_json::Value> {
            self.record(format!("countdown:{duration}"));
            Ok(serde_json::json!({ "message": "Countdown started" }))
        }

        async fn broadcast_game_result(&self, game_result: &str) -> Result<serde_json::Value> {
            self.record(format!("result:{game_result}"));
            Ok(serde_json::json!({ "message": "Game result broadcasted" }))
        }

        async fn synthesize_speech(
            &self,
            text: &str,
            _lang: &str,
            _engine: SpeechEngine,
        ) -> Result<Vec<u8>> {
            self.record(format!("speak:{text}"));
            Ok(vec![0u8; 4])
        }
    }

    fn countdown_json(value: i64) -> String {
        format!(r#"{{"type":"countdown","value":{value}}}"#)
    }

    fn config() -> ClientConfig {
        ClientConfig::new("http://api.test", "ws://api.test")
    }

    fn start(
        incoming: Vec<Option<std::result::Result<String, AicebreakerError>>>,
        role: ChannelRole,
        config: &ClientConfig,
    ) -> (
        ChannelClient,
        mpsc::Receiver<GameEvent>,
        Arc<RecordingBackend>,
        Arc<AtomicBool>,
    ) {
        let (transport, closed) = MockTransport::new(incoming);
        let backend = Arc::new(RecordingBackend::default());
        let services = RoundServices::new(backend.clone(), Arc::new(SilentAudio));
        let (client, events) = ChannelClient::start(transport, role, services, config);
        (client, events, backend, closed)
    }

    fn player() -> ChannelRole {
        ChannelRole::Player(Identity::new("rPlayer"))
    }

    /// Receive events until one matches, returning everything seen.
    async fn recv_until(
        events: &mut mpsc::Receiver<GameEvent>,
        pred: impl Fn(&GameEvent) -> bool,
    ) -> Vec<GameEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
                .await
                .expect("timed out waiting for event")
                .expect("event channel closed");
            let done = pred(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (mut client, mut events, _backend, _closed) = start(vec![], player(), &config());
        assert_eq!(events.recv().await, Some(GameEvent::Connected));
        assert!(client.is_connected());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn countdown_message_updates_state() {
        let (mut client, mut events, _backend, _closed) =
            start(vec![Some(Ok(countdown_json(4)))], player(), &config());
        recv_until(&mut events, |e| {
            matches!(e, GameEvent::CountdownChanged { value: Some(4) })
        })
        .await;
        assert_eq!(client.countdown().await, Some(4));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn zero_submits_once_despite_duplicates() {
        let config = config().with_spoken_cues(false);
        let (mut client, mut events, backend, _closed) = start(
            vec![
                Some(Ok(countdown_json(1))),
                Some(Ok(countdown_json(0))),
                Some(Ok(countdown_json(0))),
                Some(Ok("Compteur: 0".into())),
            ],
            player(),
            &config,
        );
        recv_until(&mut events, |e| matches!(e, GameEvent::ResponseSubmitted { .. })).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(backend.calls(), vec!["submit:rPlayer".to_string()]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn manager_zero_chooses_and_broadcasts_result() {
        let config = config().with_spoken_cues(false);
        let (mut client, mut events, backend, _closed) =
            start(vec![Some(Ok(countdown_json(0)))], ChannelRole::Manager, &config);

        let seen = recv_until(&mut events, |e| {
            matches!(e, GameEvent::RoundResultChosen { .. })
        })
        .await;
        let Some(GameEvent::RoundResultChosen { gesture }) = seen.last().cloned() else {
            panic!("expected RoundResultChosen");
        };
        assert_eq!(client.round_result().await, Some(gesture));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            backend.calls(),
            vec![format!("result:{}", gesture.broadcast_label())]
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn spoken_cues_are_synthesized() {
        let (mut client, mut events, backend, _closed) = start(
            vec![Some(Ok(countdown_json(3))), Some(Ok(countdown_json(3)))],
            ChannelRole::Manager,
            &config(),
        );
        recv_until(&mut events, |e| {
            matches!(e, GameEvent::CountdownChanged { value: Some(3) })
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.calls(), vec!["speak:3".to_string()]);
        client.shutdown().await;
    }

    #[tokio::test]
    async fn begin_round_clears_result_and_sets_countdown() {
        let config = config().with_spoken_cues(false);
        let (mut client, mut events, _backend, _closed) =
            start(vec![Some(Ok(countdown_json(0)))], ChannelRole::Manager, &config);
        recv_until(&mut events, |e| {
            matches!(e, GameEvent::RoundResultChosen { .. })
        })
        .await;

        client.begin_round(5).unwrap();
        recv_until(&mut events, |e| {
            matches!(e, GameEvent::CountdownChanged { value: Some(5) })
        })
        .await;
        assert_eq!(client.countdown().await, Some(5));
        assert!(client.round_result().await.is_none());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn server_close_closes_transport_and_disconnects() {
        let (mut client, mut events, _backend, closed) = start(vec![None], player(), &config());
        let seen = recv_until(&mut events, |e| matches!(e, GameEvent::Disconnected { .. })).await;
        assert_eq!(seen.last(), Some(&GameEvent::Disconnected { reason: None }));
        assert!(!client.is_connected());
        assert!(closed.load(Ordering::Relaxed));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_closes_transport() {
        let (mut client, mut events, _backend, closed) = start(vec![], player(), &config());
        let _ = events.recv().await; // Connected
        client.shutdown().await;
        assert!(closed.load(Ordering::Relaxed));
        assert!(!client.is_connected());
        assert!(matches!(
            events.recv().await,
            Some(GameEvent::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn receive_error_disconnects_with_reason() {
        let (mut client, mut events, _backend, _closed) = start(
            vec![Some(Err(AicebreakerError::TransportReceive("boom".into())))],
            player(),
            &config(),
        );
        let seen = recv_until(&mut events, |e| matches!(e, GameEvent::Disconnected { .. })).await;
        let Some(GameEvent::Disconnected { reason }) = seen.last() else {
            panic!("expected Disconnected");
        };
        assert!(reason.as_deref().unwrap().contains("boom"));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn commands_after_shutdown_fail() {
        let (mut client, _events, _backend, _closed) = start(vec![], player(), &config());
        client.shutdown().await;
        assert!(matches!(
            client.set_countdown(None),
            Err(AicebreakerError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (mut client, _events, _backend, _closed) = start(vec![], player(), &config());
        client.shutdown().await;
        client.shutdown().await;
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (mut client, _events, _backend, _closed) = start(vec![], ChannelRole::Manager, &config());
        let debug = format!("{client:?}");
        assert!(debug.contains("ChannelClient"));
        assert!(debug.contains("Manager"));
        client.shutdown().await;
    }
}

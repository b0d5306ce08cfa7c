#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for AIcebreaker client integration tests.
//!
//! Provides a scripted [`MockTransport`], a [`MockConnector`] that hands out
//! scripted transports, a recording [`MockBackend`], a [`RecordingAudio`]
//! sink and helpers for constructing channel payloads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use aicebreaker_client::config::{ResponsePayload, SpeechEngine};
use aicebreaker_client::error::Result;
use aicebreaker_client::protocol::{GameResultPayload, RosterEntry, ServerMessage};
use aicebreaker_client::{
    AicebreakerError, AudioSink, Backend, ClientConfig, Connector, GameEvent, Identity, Transport,
};
use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

// ── MockTransport ───────────────────────────────────────────────────

/// A scripted mock transport.
///
/// Scripted server payloads are consumed in order by `recv()`. Once the
/// script is exhausted the transport hangs until the loop shuts down.
pub struct MockTransport {
    incoming: VecDeque<Option<std::result::Result<String, AicebreakerError>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Returns the transport plus a shared handle telling whether close was
    /// called.
    pub fn new(
        incoming: Vec<Option<std::result::Result<String, AicebreakerError>>>,
    ) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            closed: Arc::clone(&closed),
        };
        (transport, closed)
    }

    /// A transport that delivers `payloads` and then stays open.
    pub fn scripted(payloads: &[String]) -> (Self, Arc<AtomicBool>) {
        Self::new(payloads.iter().cloned().map(|p| Some(Ok(p))).collect())
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

// ── MockConnector ───────────────────────────────────────────────────

/// Hands out scripted transports, one per `connect` call, and records the
/// URLs it was asked for. Fails once the script runs out.
#[derive(Clone, Default)]
pub struct MockConnector {
    transports: Arc<StdMutex<VecDeque<MockTransport>>>,
    pub urls: Arc<StdMutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new(transports: Vec<MockTransport>) -> Self {
        Self {
            transports: Arc::new(StdMutex::new(VecDeque::from(transports))),
            urls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// A connector whose every `connect` fails.
    pub fn refusing() -> Self {
        Self::new(Vec::new())
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &str) -> std::result::Result<MockTransport, AicebreakerError> {
        self.urls.lock().unwrap().push(url.to_string());
        self.transports.lock().unwrap().pop_front().ok_or_else(|| {
            AicebreakerError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))
        })
    }
}

// ── MockBackend ─────────────────────────────────────────────────────

/// Records every request in order and answers from a small script.
pub struct MockBackend {
    /// Identity returned by `generate_client_id`; `None` makes it fail.
    pub identity: Option<Identity>,
    /// When set, every request except identity generation fails.
    pub fail_requests: bool,
    /// When set, submissions and countdown broadcasts are recorded and then
    /// wait for a permit before answering.
    pub gate: Option<Arc<Notify>>,
    pub calls: Arc<StdMutex<Vec<String>>>,
}

impl MockBackend {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: Some(Identity::new(identity)),
            fail_requests: false,
            gate: None,
            calls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    /// A backend that cannot issue identities.
    pub fn without_identity() -> Self {
        Self {
            identity: None,
            ..Self::new("unused")
        }
    }

    #[must_use]
    pub fn failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    /// Hold submissions and countdown broadcasts until `gate` is notified.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    /// Calls whose name starts with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_requests {
            Err(AicebreakerError::HttpStatus {
                path: "/mock",
                status: 500,
                body: "mock failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn generate_client_id(&self) -> Result<Identity> {
        self.calls.lock().unwrap().push("generate_client_id".into());
        self.identity.clone().ok_or(AicebreakerError::HttpStatus {
            path: "/api/generate-client-id",
            status: 503,
            body: "unavailable".into(),
        })
    }

    async fn submit_countdown_response(
        &self,
        identity: &Identity,
        response: &ResponsePayload,
    ) -> Result<serde_json::Value> {
        self.record(format!("submit:{identity}:{}", response.value))?;
        self.wait_for_gate().await;
        Ok(serde_json::json!({ "status": "success" }))
    }

    async fn broadcast_countdown(&self, duration: u32) -> Result<serde_json::Value> {
        self.record(format!("countdown:{duration}"))?;
        self.wait_for_gate().await;
        Ok(serde_json::json!({ "message": "Countdown started" }))
    }

    async fn broadcast_game_result(&self, game_result: &str) -> Result<serde_json::Value> {
        self.record(format!("result:{game_result}"))?;
        Ok(serde_json::json!({ "message": "Game result broadcasted" }))
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        _lang: &str,
        _engine: SpeechEngine,
    ) -> Result<Vec<u8>> {
        self.record(format!("speak:{text}"))?;
        Ok(text.as_bytes().to_vec())
    }
}

// ── RecordingAudio ──────────────────────────────────────────────────

/// Audio sink that records the label of every clip it is asked to play.
#[derive(Clone, Default)]
pub struct RecordingAudio {
    pub played: Arc<StdMutex<Vec<String>>>,
}

impl RecordingAudio {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioSink for RecordingAudio {
    async fn play(&self, label: &str, _clip: Vec<u8>) -> Result<()> {
        self.played.lock().unwrap().push(label.to_string());
        Ok(())
    }
}

// ── Config and event helpers ────────────────────────────────────────

/// Config pointing at unroutable test addresses, with a short intro delay.
pub fn test_config() -> ClientConfig {
    ClientConfig::new("http://api.test", "ws://api.test")
        .with_intro_delay(Duration::from_millis(10))
        .with_shutdown_timeout(Duration::from_millis(500))
}

/// Receive events until one matches `pred`, returning everything seen.
/// Panics after two seconds without a match.
pub async fn recv_until(
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

/// Wait until `backend` has recorded a call starting with `prefix`.
/// Panics after two seconds.
pub async fn wait_for_call(backend: &MockBackend, prefix: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while backend.calls_matching(prefix).is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no `{prefix}` call recorded"));
}

/// Give spawned effect tasks a moment to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `countdown` message.
pub fn countdown_json(value: i64) -> String {
    serde_json::to_string(&ServerMessage::Countdown { value }).expect("countdown_json")
}

/// Returns the JSON string for a `clients_update` message.
pub fn clients_update_json(clients: &[(&str, &str, bool)]) -> String {
    let clients = clients
        .iter()
        .map(|(id, name, connected)| RosterEntry {
            identity: Identity::new(*id),
            display_name: (*name).to_string(),
            connected: *connected,
        })
        .collect();
    serde_json::to_string(&ServerMessage::ClientsUpdate { clients }).expect("clients_update_json")
}

/// Returns the JSON string for a `master_result` message.
pub fn master_result_json(value: &str) -> String {
    serde_json::to_string(&ServerMessage::MasterResult {
        value: serde_json::Value::String(value.into()),
    })
    .expect("master_result_json")
}

/// Returns the JSON string for a `game_result` message describing a
/// player's analysed submission.
pub fn game_result_json(username: &str, gesture: &str) -> String {
    let payload = GameResultPayload {
        username: Some(username.into()),
        gesture: Some(gesture.into()),
        emotions: [("joy".to_string(), 81.5), ("surprise".to_string(), 12.0)]
            .into_iter()
            .collect(),
        emotion_score: Some(74.0),
        ..GameResultPayload::default()
    };
    serde_json::to_string(&ServerMessage::GameResult(payload)).expect("game_result_json")
}

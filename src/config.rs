//! Client configuration.
//!
//! Two base addresses are required before any network activity: one for the
//! one-shot HTTP requests and one for the channel endpoint. Everything else
//! has a default.

use std::time::Duration;

use crate::error::{AicebreakerError, Result};
use crate::identity::ChannelRole;

/// Environment variable holding the HTTP base address.
pub const API_ADDR_ENV: &str = "FASTAPI_ADDR";

/// Environment variable holding the channel base address.
pub const WS_ADDR_ENV: &str = "FASTAPI_ADDR_WS";

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

const DEFAULT_COUNTDOWN_START: u32 = 5;

const DEFAULT_INTRO_DELAY: Duration = Duration::from_millis(2500);

/// Speech synthesis backend exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechEngine {
    #[default]
    Google,
    X3,
}

impl SpeechEngine {
    pub fn path(self) -> &'static str {
        match self {
            Self::Google => "/api/tts_google/",
            Self::X3 => "/api/tts_x3/",
        }
    }
}

/// Fields sent with a player's automatic submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePayload {
    pub value: String,
    pub image: Vec<u8>,
    pub image_name: String,
    pub image_mime: String,
}

impl Default for ResponsePayload {
    fn default() -> Self {
        Self {
            value: "42".to_string(),
            image: b"test image content".to_vec(),
            image_name: "response.jpg".to_string(),
            image_mime: "image/jpeg".to_string(),
        }
    }
}

/// Configuration shared by player and master sessions.
///
/// # Example
///
/// ```
/// use aicebreaker_client::config::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("http://localhost:8000", "ws://localhost:8000")
///     .with_countdown_start(10)
///     .with_shutdown_timeout(Duration::from_secs(2));
/// assert_eq!(config.countdown_start, 10);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address for one-shot requests, without a trailing slash.
    pub api_base_url: String,
    /// Base address for the channel endpoint, without a trailing slash.
    pub ws_base_url: String,
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer falls behind, events are dropped (with a warning) so
    /// the transport loop never blocks. `Disconnected` is always delivered.
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the transport loop gets to close the channel on shutdown before
    /// it is aborted. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// Countdown length the master broadcasts. Defaults to **5**, minimum 1.
    pub countdown_start: u32,
    pub speech_engine: SpeechEngine,
    pub speech_lang: String,
    /// Whether the reactor announces 3, 2, 1 and zero.
    pub spoken_cues: bool,
    /// Pause between the master's two start-of-round announcements.
    pub intro_delay: Duration,
    pub response: ResponsePayload,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>, ws_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: trim_base(api_base_url.into()),
            ws_base_url: trim_base(ws_base_url.into()),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            countdown_start: DEFAULT_COUNTDOWN_START,
            speech_engine: SpeechEngine::default(),
            speech_lang: "fr".to_string(),
            spoken_cues: true,
            intro_delay: DEFAULT_INTRO_DELAY,
            response: ResponsePayload::default(),
        }
    }

    /// Read both base addresses from [`API_ADDR_ENV`] and [`WS_ADDR_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`AicebreakerError::MissingConfig`] if either variable is unset
    /// or blank.
    pub fn from_env() -> Result<Self> {
        let api = env_required(API_ADDR_ENV)?;
        let ws = env_required(WS_ADDR_ENV)?;
        let config = Self::new(api, ws);
        config.validate()?;
        Ok(config)
    }

    /// Check that both base addresses use the scheme their endpoints need.
    ///
    /// # Errors
    ///
    /// Returns [`AicebreakerError::InvalidUrl`] naming the first bad address.
    pub fn validate(&self) -> Result<()> {
        if !has_scheme(&self.api_base_url, &["http://", "https://"]) {
            return Err(AicebreakerError::InvalidUrl(self.api_base_url.clone()));
        }
        if !has_scheme(&self.ws_base_url, &["ws://", "wss://"]) {
            return Err(AicebreakerError::InvalidUrl(self.ws_base_url.clone()));
        }
        Ok(())
    }

    /// Full URL of the channel endpoint for `role`.
    pub fn channel_url(&self, role: &ChannelRole) -> String {
        format!("{}/ws/{}", self.ws_base_url, role.channel_segment())
    }

    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_countdown_start(mut self, start: u32) -> Self {
        self.countdown_start = start.max(1);
        self
    }

    #[must_use]
    pub fn with_speech(mut self, engine: SpeechEngine, lang: impl Into<String>) -> Self {
        self.speech_engine = engine;
        self.speech_lang = lang.into();
        self
    }

    #[must_use]
    pub fn with_spoken_cues(mut self, enabled: bool) -> Self {
        self.spoken_cues = enabled;
        self
    }

    #[must_use]
    pub fn with_intro_delay(mut self, delay: Duration) -> Self {
        self.intro_delay = delay;
        self
    }

    #[must_use]
    pub fn with_response(mut self, response: ResponsePayload) -> Self {
        self.response = response;
        self
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

fn env_required(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AicebreakerError::MissingConfig(name)),
    }
}

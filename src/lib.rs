//! # AIcebreaker Client
//!
//! Async Rust client for the AIcebreaker rock-paper-scissors countdown game.
//!
//! A **master** drives a countdown and broadcasts the round result. **Players**
//! hold a backend-issued identity, receive countdown ticks over a push-only
//! channel and submit a response automatically when the countdown reaches
//! zero.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] and [`Connector`]
//!   traits for any push-only text stream
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   [`WebSocketTransport`] and [`WebSocketConnector`]
//! - **Fire-once reactions**: the [`CountdownReactor`] triggers speech cues,
//!   submissions and broadcasts exactly once per countdown transition
//! - **Event-driven**: receive typed [`GameEvent`]s via a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), aicebreaker_client::AicebreakerError> {
//! use std::sync::Arc;
//! use aicebreaker_client::{
//!     ClientConfig, GameEvent, HttpBackend, PlayerSession, SilentAudio, WebSocketConnector,
//! };
//!
//! let config = ClientConfig::from_env()?;
//! let backend = Arc::new(HttpBackend::new(&config));
//! let (mut session, mut events) =
//!     PlayerSession::mount(config, backend, WebSocketConnector::new(), Arc::new(SilentAudio)).await;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//!     if matches!(event, GameEvent::Disconnected { .. }) {
//!         break;
//!     }
//! }
//! session.unmount().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod audio;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod identity;
pub mod outcome;
pub mod protocol;
pub mod reactor;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use api::{Backend, HttpBackend};
pub use audio::{AudioSink, SilentAudio};
pub use client::{ChannelClient, RoundServices};
pub use config::{ClientConfig, ResponsePayload, SpeechEngine};
pub use dispatcher::RoundState;
pub use error::AicebreakerError;
pub use event::GameEvent;
pub use identity::{ChannelRole, Identity, IdentityState};
pub use outcome::{resolve, Gesture, Verdict};
pub use protocol::{parse_inbound, Inbound, RosterEntry, ServerMessage};
pub use reactor::{CountdownReactor, Effect};
pub use session::{MasterSession, PlayerSession};
pub use transport::{Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};

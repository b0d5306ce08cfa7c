//! # Player Example
//!
//! Demonstrates a complete AIcebreaker player lifecycle:
//!
//! 1. Ask the backend for a player identity
//! 2. Open the player's channel (`/ws/{identity}`)
//! 3. Follow the countdown; the response is submitted automatically at zero
//! 4. Compare a gesture against the master's result when it is broadcast
//! 5. Unmount gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start the AIcebreaker backend on localhost:8000, then:
//! FASTAPI_ADDR=http://localhost:8000 FASTAPI_ADDR_WS=ws://localhost:8000 \
//!     cargo run --example player
//!
//! # Play a fixed gesture instead of a random one:
//! PLAYER_GESTURE=feuille cargo run --example player
//! ```

use std::sync::Arc;

use aicebreaker_client::{
    resolve, ClientConfig, GameEvent, Gesture, HttpBackend, PlayerSession, SilentAudio,
    WebSocketConnector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = ClientConfig::from_env()?;
    let gesture = std::env::var("PLAYER_GESTURE")
        .ok()
        .and_then(|g| g.parse::<Gesture>().ok())
        .unwrap_or_else(Gesture::random);
    tracing::info!("Playing {gesture} against {}", config.api_base_url);

    // ── Mount ───────────────────────────────────────────────────────
    let backend = Arc::new(HttpBackend::new(&config));
    let (mut session, mut event_rx) =
        PlayerSession::mount(config, backend, WebSocketConnector::new(), Arc::new(SilentAudio))
            .await;

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    GameEvent::IdentityAssigned { identity } => {
                        tracing::info!("Identity: {identity}");
                    }
                    GameEvent::IdentityFailed { reason } => {
                        tracing::error!("Could not get an identity: {reason}");
                        break;
                    }
                    GameEvent::Connected => {
                        tracing::info!("Channel open, waiting for the master…");
                    }
                    GameEvent::CountdownChanged { value: Some(value) } => {
                        tracing::info!("Countdown: {value}");
                    }
                    GameEvent::ResponseSubmitted { ack } => {
                        tracing::info!("Response submitted: {ack}");
                    }
                    // The master's round result arrives as a game_result with a value.
                    GameEvent::GameResult(payload) => {
                        if let Some(label) = payload.value.as_deref() {
                            match Gesture::from_broadcast_label(label) {
                                Some(master) => {
                                    let verdict = resolve(gesture.as_str(), master.as_str());
                                    tracing::info!("Master played {label}: {verdict:?}");
                                }
                                None => tracing::warn!("Unknown master result: {label}"),
                            }
                        }
                    }
                    GameEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("closed by server"));
                        break;
                    }
                    other => {
                        tracing::debug!("Event: {other:?}");
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    session.unmount().await;
    tracing::info!("Session unmounted. Goodbye!");
    Ok(())
}

//! # Master Example
//!
//! Opens the manager channel, starts one round and reports the roster, the
//! players' analysed submissions and the round result.
//!
//! ## Running
//!
//! ```sh
//! FASTAPI_ADDR=http://localhost:8000 FASTAPI_ADDR_WS=ws://localhost:8000 \
//!     cargo run --example master
//!
//! # Count down from 10 instead of the default 5:
//! cargo run --example master -- 10
//! ```

use std::sync::Arc;
use std::time::Duration;

use aicebreaker_client::{
    ClientConfig, GameEvent, HttpBackend, MasterSession, SilentAudio, WebSocketConnector,
};

/// How long to keep listening for submissions after the result is chosen.
const RESULT_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let backend = Arc::new(HttpBackend::new(&config));
    let (mut session, mut event_rx) =
        MasterSession::mount(config, backend, WebSocketConnector::new(), Arc::new(SilentAudio))
            .await;

    if let Some(start) = std::env::args().nth(1) {
        session.edit_countdown_start_text(&start);
    }

    if session.is_connected() {
        tracing::info!("Starting a {}-tick round", session.countdown_start());
        if let Err(e) = session.start_countdown().await {
            tracing::error!("Could not start the round: {e}");
        }
    }

    let grace = tokio::time::sleep(Duration::MAX);
    tokio::pin!(grace);

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    break;
                };

                match event {
                    GameEvent::RosterUpdated { clients } => {
                        tracing::info!("{} player(s) registered", clients.len());
                        for client in &clients {
                            let status = if client.connected { "online" } else { "offline" };
                            tracing::info!("  {} ({}) {status}", client.display_name, client.identity);
                        }
                    }
                    GameEvent::CountdownChanged { value: Some(value) } => {
                        tracing::info!("Countdown: {value}");
                    }
                    GameEvent::RoundResultChosen { gesture } => {
                        tracing::info!("Round result: {}", gesture.broadcast_label());
                        grace.as_mut().reset(tokio::time::Instant::now() + RESULT_GRACE);
                    }
                    GameEvent::GameResult(payload) => {
                        if let (Some(username), Some(gesture)) = (&payload.username, &payload.gesture) {
                            tracing::info!("{username} played {gesture}");
                        }
                        if let Some((emotion, score)) = payload.top_emotion() {
                            tracing::info!("  top emotion: {emotion} ({score:.0}%)");
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

            _ = &mut grace => {
                tracing::info!("Round over");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    session.unmount().await;
    Ok(())
}

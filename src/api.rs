//! One-shot requests to the game backend.
//!
//! The [`Backend`] trait is the seam between the sessions and the HTTP API,
//! the same way [`Transport`](crate::Transport) is the seam for the channel.
//! [`HttpBackend`] is the `reqwest` implementation.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::config::{ClientConfig, ResponsePayload, SpeechEngine};
use crate::error::{AicebreakerError, Result};
use crate::identity::Identity;
use crate::protocol::{ClientIdResponse, CountdownRequest, GameResultRequest, SpeechRequest};

pub const GENERATE_CLIENT_ID_PATH: &str = "/api/generate-client-id";
pub const COUNTDOWN_RESPONSE_PATH: &str = "/api/countdown-response";
pub const BROADCAST_COUNTDOWN_PATH: &str = "/api/broadcast_countdown";
pub const BROADCAST_GAME_RESULT_PATH: &str = "/api/broadcast_game_result";

/// One-shot requests used by player and master sessions.
///
/// Acknowledgements are returned as raw JSON: the client only logs them.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Ask the backend for a fresh player identity.
    async fn generate_client_id(&self) -> Result<Identity>;

    /// Submit a player's response at the end of a round.
    async fn submit_countdown_response(
        &self,
        identity: &Identity,
        response: &ResponsePayload,
    ) -> Result<serde_json::Value>;

    /// Ask the backend to push a countdown of `duration` ticks to every client.
    async fn broadcast_countdown(&self, duration: u32) -> Result<serde_json::Value>;

    /// Ask the backend to push the round result to every client.
    async fn broadcast_game_result(&self, game_result: &str) -> Result<serde_json::Value>;

    /// Synthesize `text` and return the encoded audio.
    async fn synthesize_speech(
        &self,
        text: &str,
        lang: &str,
        engine: SpeechEngine,
    ) -> Result<Vec<u8>>;
}

/// [`Backend`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    api_base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Use a preconfigured `reqwest` client (timeouts, proxies, TLS).
    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            api_base_url: config.api_base_url.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base_url)
    }

    async fn json_ack(
        &self,
        path: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value> {
        let response = checked(path, request.send().await?).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }
}

/// Turn a non-success status into [`AicebreakerError::HttpStatus`].
async fn checked(path: &'static str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AicebreakerError::HttpStatus {
        path,
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn generate_client_id(&self) -> Result<Identity> {
        let url = self.url(GENERATE_CLIENT_ID_PATH);
        tracing::debug!(url = %url, "requesting client identity");
        let response = checked(GENERATE_CLIENT_ID_PATH, self.http.get(&url).send().await?).await?;
        let body: ClientIdResponse = response.json().await?;
        Ok(body.wallet_address)
    }

    async fn submit_countdown_response(
        &self,
        identity: &Identity,
        response: &ResponsePayload,
    ) -> Result<serde_json::Value> {
        let image = Part::bytes(response.image.clone())
            .file_name(response.image_name.clone())
            .mime_str(&response.image_mime)?;
        let form = Form::new()
            .text("wallet_address", identity.as_str().to_string())
            .text("value", response.value.clone())
            .part("image", image);
        let request = self
            .http
            .post(self.url(COUNTDOWN_RESPONSE_PATH))
            .multipart(form);
        self.json_ack(COUNTDOWN_RESPONSE_PATH, request).await
    }

    async fn broadcast_countdown(&self, duration: u32) -> Result<serde_json::Value> {
        let request = self
            .http
            .post(self.url(BROADCAST_COUNTDOWN_PATH))
            .json(&CountdownRequest { duration });
        self.json_ack(BROADCAST_COUNTDOWN_PATH, request).await
    }

    async fn broadcast_game_result(&self, game_result: &str) -> Result<serde_json::Value> {
        let request = self
            .http
            .post(self.url(BROADCAST_GAME_RESULT_PATH))
            .json(&GameResultRequest {
                game_result: game_result.to_string(),
            });
        self.json_ack(BROADCAST_GAME_RESULT_PATH, request).await
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        lang: &str,
        engine: SpeechEngine,
    ) -> Result<Vec<u8>> {
        let path = engine.path();
        let request = self.http.post(self.url(path)).json(&SpeechRequest {
            text: text.to_string(),
            lang: lang.to_string(),
        });
        let response = checked(path, request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn http_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpBackend>();
    }

    #[test]
    fn backend_is_object_safe() {
        fn assert_object_safe(_: Option<&dyn Backend>) {}
        assert_object_safe(None);
    }

    #[tokio::test]
    async fn unreachable_backend_returns_http_error() {
        let config = ClientConfig::new("http://127.0.0.1:1", "ws://127.0.0.1:1");
        let backend = HttpBackend::new(&config);
        let err = backend.generate_client_id().await.unwrap_err();
        assert!(matches!(err, AicebreakerError::Http(_)));
    }
}

use futures_util::stream::BoxStream;
use serde::Serialize;

use super::sse::{SseParser, StreamEvent};
use super::{BackendClient, BackendResult, classify_reqwest_error, ensure_success};
use crate::config::Settings;

/// Boxed stream of turn events, as returned by `BackendClient::open_stream`.
pub type TurnStream = BoxStream<'static, BackendResult<StreamEvent>>;

/// Query parameters of one streaming request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamRequest {
    pub user_input: String,
    pub model: String,
    pub temperature: f32,
    pub verbosity: u8,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
}

impl StreamRequest {
    pub fn new(user_input: impl Into<String>, settings: &Settings) -> Self {
        Self {
            user_input: user_input.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            verbosity: settings.verbosity,
            debug: settings.debug,
        }
    }
}

impl BackendClient {
    /// Opens the event stream for one turn.
    ///
    /// The request timeout is not applied here; a turn may stream for as long
    /// as the server keeps the connection open.
    ///
    /// # Errors
    /// Returns an error if the connection fails or the server responds with a
    /// non-success status.
    pub async fn open_stream(&self, request: &StreamRequest) -> BackendResult<TurnStream> {
        let response = self
            .http
            .get(self.url(&self.server.stream_path))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .query(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let response = ensure_success(response).await?;
        tracing::debug!(status = %response.status(), "turn stream opened");

        Ok(Box::pin(SseParser::new(response.bytes_stream())))
    }
}

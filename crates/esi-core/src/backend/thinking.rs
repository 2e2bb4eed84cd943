use serde::Deserialize;

use super::{BackendClient, BackendError, BackendResult, classify_reqwest_error, ensure_success};

/// Loading label used when the server offers no phrases.
pub const DEFAULT_THINKING_PHRASE: &str = "Thinking…";

#[derive(Debug, Deserialize)]
struct ThinkingResponse {
    #[serde(default)]
    phrases: Vec<String>,
}

impl BackendClient {
    /// Fetches the loading-indicator phrases.
    ///
    /// Blank phrases are dropped.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status or an
    /// unreadable body.
    pub async fn fetch_thinking_phrases(&self) -> BackendResult<Vec<String>> {
        let response = self
            .get(&self.server.thinking_path)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let response = ensure_success(response).await?;

        let body: ThinkingResponse = response
            .json()
            .await
            .map_err(|e| BackendError::parse(format!("Invalid thinking response: {e}")))?;

        Ok(body
            .phrases
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect())
    }
}

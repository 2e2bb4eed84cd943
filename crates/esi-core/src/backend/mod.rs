//! HTTP clients for the ESI server.
//!
//! - `sse`: server-sent event parser for turn streams
//! - `stream`: opens the per-turn event stream
//! - `figures`: fetches plot specifications captured during a turn
//! - `ingest`: multipart file upload pass-through
//! - `thinking`: loading-indicator phrases

mod figures;
mod ingest;
mod sse;
mod stream;
mod thinking;

use std::fmt;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ServerConfig;

pub use ingest::upload_file_name;
pub use sse::{SseParser, StreamEvent};
pub use stream::{StreamRequest, TurnStream};
pub use thinking::DEFAULT_THINKING_PHRASE;

/// Standard User-Agent header for ESI requests.
pub const USER_AGENT: &str = concat!("esi/", env!("CARGO_PKG_VERSION"));

/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "ESI_BASE_URL";

/// Resolves the server base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the chosen URL is not a valid absolute URL.
pub fn resolve_base_url(config_base_url: Option<&str>) -> Result<String> {
    if let Ok(env_url) = std::env::var(BASE_URL_ENV) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(ServerConfig::DEFAULT_BASE_URL.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid ESI server base URL: {url}"))?;
    Ok(())
}

/// Categories of backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Connection timeout or request timeout
    Timeout,
    /// Failed to parse a response (JSON, SSE, figure document)
    Parse,
    /// Error reported by the server in a response body
    ApiError,
    /// Transport dropped or local I/O failed
    Io,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::HttpStatus => write!(f, "http_status"),
            BackendErrorKind::Timeout => write!(f, "timeout"),
            BackendErrorKind::Parse => write!(f, "parse"),
            BackendErrorKind::ApiError => write!(f, "api_error"),
            BackendErrorKind::Io => write!(f, "io"),
        }
    }
}

/// Structured error from a backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendError {
    /// Error category
    pub kind: BackendErrorKind,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, preferring the server's own message.
    ///
    /// The ESI server reports failures as `{"error": "..."}` or
    /// `{"detail": "..."}`.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let server_message = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            ["error", "detail", "message"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
        });
        let message = match server_message {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: BackendErrorKind::HttpStatus,
            message,
            details,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Parse, message)
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ApiError, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Io, message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

fn classify_reqwest_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        BackendError::io(format!("Connection failed: {e}"))
    } else if e.is_decode() {
        BackendError::parse(format!("Failed to decode response: {e}"))
    } else {
        BackendError::io(format!("Network error: {e}"))
    }
}

/// Checks the status and turns a failure into an HTTP status error.
async fn ensure_success(response: reqwest::Response) -> BackendResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::http_status(status.as_u16(), &body))
}

/// Client for every endpoint of the ESI server.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    server: ServerConfig,
}

impl BackendClient {
    /// Builds a client from the server config, resolving the base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let base_url = resolve_base_url(Some(&server.base_url))?;
        Self::build(server, base_url)
    }

    /// Builds a client for an explicit base URL, bypassing env and config.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn with_base_url(server: &ServerConfig, base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim();
        validate_url(trimmed)?;
        Self::build(server, trimmed.trim_end_matches('/').to_string())
    }

    fn build(server: &ServerConfig, base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            server: server.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// GET request with the configured timeout applied.
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.get(self.url(path));
        match self.server.request_timeout() {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_prefers_server_message() {
        let err = BackendError::http_status(500, r#"{"error": "figure store offline"}"#);
        assert_eq!(err.kind, BackendErrorKind::HttpStatus);
        assert_eq!(err.message, "HTTP 500: figure store offline");

        let err = BackendError::http_status(422, r#"{"detail": "bad verbosity"}"#);
        assert_eq!(err.message, "HTTP 422: bad verbosity");

        let err = BackendError::http_status(502, "Bad Gateway");
        assert_eq!(err.message, "HTTP 502");
        assert_eq!(err.details.as_deref(), Some("Bad Gateway"));
    }

    #[test]
    fn test_url_joins_paths() {
        let config = ServerConfig::default();
        let client = BackendClient::with_base_url(&config, "http://localhost:8000/").unwrap();

        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/figures"), "http://localhost:8000/figures");
        assert_eq!(client.url("thinking"), "http://localhost:8000/thinking");
    }

    #[test]
    fn test_explicit_base_url_is_validated() {
        assert!(BackendClient::with_base_url(&ServerConfig::default(), "not a url").is_err());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        if std::env::var(BASE_URL_ENV).is_err() {
            assert!(resolve_base_url(Some("not a url")).is_err());
            assert_eq!(
                resolve_base_url(None).unwrap(),
                ServerConfig::DEFAULT_BASE_URL
            );
        }
    }
}

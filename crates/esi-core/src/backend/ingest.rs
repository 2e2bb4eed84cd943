use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{BackendClient, BackendError, BackendResult, classify_reqwest_error};

/// Body of an upload response: either `{message}` or `{error}`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Returns the file name sent with the multipart part.
pub fn upload_file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

impl BackendClient {
    /// Sends a file to the server's ingestion endpoint.
    ///
    /// Returns the server's confirmation message.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the request fails, or the
    /// server answers with `{error}` or a non-success status.
    pub async fn upload_file(&self, path: &Path) -> BackendResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BackendError::io(format!("Failed to read {}: {e}", path.display())))?;

        let part = Part::bytes(bytes).file_name(upload_file_name(path));
        let form = Form::new().part("file", part);

        let mut builder = self
            .http
            .post(self.url(&self.server.upload_path))
            .multipart(form);
        if let Some(timeout) = self.server.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::http_status(status.as_u16(), &body));
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::parse(format!("Invalid upload response: {e}")))?;
        match (parsed.error, parsed.message) {
            (Some(error), _) => Err(BackendError::api_error(error)),
            (None, Some(message)) => Ok(message),
            (None, None) => Err(BackendError::parse(
                "Upload response has neither message nor error",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_upload_file_name_uses_last_component() {
        assert_eq!(
            upload_file_name(&PathBuf::from("/tmp/data/report.pdf")),
            "report.pdf"
        );
        assert_eq!(upload_file_name(Path::new("notes.txt")), "notes.txt");
    }
}

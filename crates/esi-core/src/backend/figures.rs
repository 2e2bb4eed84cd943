use serde::Deserialize;

use super::{BackendClient, BackendError, BackendResult, classify_reqwest_error, ensure_success};
use crate::artifacts::Figure;

#[derive(Debug, Deserialize)]
struct FiguresResponse {
    #[serde(default)]
    figures: Vec<String>,
}

/// Decodes each JSON-encoded figure entry; one bad entry fails the batch.
fn decode_figures(entries: &[String]) -> BackendResult<Vec<Figure>> {
    entries
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            serde_json::from_str(raw)
                .map(Figure)
                .map_err(|e| BackendError::parse(format!("Figure {i} is not valid JSON: {e}")))
        })
        .collect()
}

impl BackendClient {
    /// Fetches the plot specifications produced during the current turn.
    ///
    /// # Errors
    /// Fails as a whole on transport errors, non-success status, or any entry
    /// that does not decode.
    pub async fn fetch_figures(&self) -> BackendResult<Vec<Figure>> {
        let response = self
            .get(&self.server.figures_path)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let response = ensure_success(response).await?;

        let body: FiguresResponse = response
            .json()
            .await
            .map_err(|e| BackendError::parse(format!("Invalid figures response: {e}")))?;

        decode_figures(&body.figures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendErrorKind;

    #[test]
    fn test_decode_figures_in_order() {
        let figures = decode_figures(&[
            r#"{"data":[{"type":"bar"}],"layout":{"title":"A"}}"#.to_string(),
            r#"{"data":[]}"#.to_string(),
        ])
        .unwrap();

        assert_eq!(figures.len(), 2);
        assert_eq!(figures[0].title(), Some("A"));
        assert_eq!(figures[1].trace_count(), 0);
    }

    #[test]
    fn test_one_bad_entry_fails_the_batch() {
        let err = decode_figures(&["{}".to_string(), "{broken".to_string()]).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Parse);
        assert!(err.message.starts_with("Figure 1"));
    }
}

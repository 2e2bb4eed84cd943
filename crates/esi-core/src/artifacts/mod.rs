//! Renderable artifacts derived from a completed turn.
//!
//! - `extract`: fenced code block extraction from response text
//! - `combine`: merges code blocks and figures into the artifact panel
//! - `export`: writes artifacts to disk

mod combine;
mod export;
mod extract;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use combine::{ArtifactPanel, combine};
pub use export::export_artifacts;
pub use extract::{DEFAULT_LANGUAGE, extract_code_blocks};

/// A fenced code region from a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Language tag from the opening fence (`"text"` when absent).
    pub language: String,
    /// Everything between the opening line and the closing fence.
    pub content: String,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            content: content.into(),
        }
    }

    /// Number of lines in the block, ignoring a trailing newline.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// A decoded plot specification (a Plotly figure document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Figure(pub Value);

impl Figure {
    /// Returns the layout title if the figure has one.
    ///
    /// Plotly accepts both `layout.title = "..."` and
    /// `layout.title = { text: "..." }`.
    pub fn title(&self) -> Option<&str> {
        let title = self.0.get("layout")?.get("title")?;
        title
            .as_str()
            .or_else(|| title.get("text").and_then(Value::as_str))
            .filter(|t| !t.trim().is_empty())
    }

    /// Number of traces in the figure's `data` array.
    pub fn trace_count(&self) -> usize {
        self.0
            .get("data")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

/// A renderable unit shown in the artifact panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Code(CodeBlock),
    Plot { spec: Figure },
}

impl Artifact {
    /// Short one-line description for listings.
    pub fn summary(&self) -> String {
        match self {
            Artifact::Code(block) => {
                let lines = block.line_count();
                let noun = if lines == 1 { "line" } else { "lines" };
                format!("code ({}, {lines} {noun})", block.language)
            }
            Artifact::Plot { spec } => match spec.title() {
                Some(title) => format!("plot \"{title}\""),
                None => format!("plot ({} traces)", spec.trace_count()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_figure_title_accepts_both_shapes() {
        let plain = Figure(json!({"layout": {"title": "Sales"}}));
        let nested = Figure(json!({"layout": {"title": {"text": "Revenue"}}}));
        let missing = Figure(json!({"data": []}));

        assert_eq!(plain.title(), Some("Sales"));
        assert_eq!(nested.title(), Some("Revenue"));
        assert_eq!(missing.title(), None);
    }

    #[test]
    fn test_artifact_summary() {
        let code = Artifact::Code(CodeBlock::new("py", "import numpy\nprint(1)\n"));
        let plot = Artifact::Plot {
            spec: Figure(json!({"data": [{"type": "bar"}, {"type": "line"}]})),
        };

        assert_eq!(code.summary(), "code (py, 2 lines)");
        assert_eq!(plot.summary(), "plot (2 traces)");
    }
}

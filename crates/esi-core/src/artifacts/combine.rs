use super::{Artifact, CodeBlock, Figure};

/// Artifacts shown for the most recent completed turn.
///
/// Replaced wholesale on every new turn and cleared when the active
/// conversation changes; never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPanel {
    artifacts: Vec<Artifact>,
}

impl ArtifactPanel {
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// The panel is shown only when it has something to show.
    pub fn is_visible(&self) -> bool {
        !self.artifacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn clear(&mut self) {
        self.artifacts.clear();
    }
}

/// Merges extracted code blocks and fetched figures into one panel.
///
/// All code artifacts precede all plots; each group keeps its source order.
pub fn combine(code_blocks: Vec<CodeBlock>, figures: Vec<Figure>) -> ArtifactPanel {
    let artifacts = code_blocks
        .into_iter()
        .map(Artifact::Code)
        .chain(figures.into_iter().map(|spec| Artifact::Plot { spec }))
        .collect();
    ArtifactPanel { artifacts }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_code_precedes_plots_in_source_order() {
        let c1 = CodeBlock::new("py", "a = 1\n");
        let c2 = CodeBlock::new("sql", "select 1;\n");
        let p1 = Figure(json!({"data": [{"type": "scatter"}]}));

        let panel = combine(vec![c1.clone(), c2.clone()], vec![p1.clone()]);

        assert_eq!(
            panel.artifacts(),
            &[
                Artifact::Code(c1),
                Artifact::Code(c2),
                Artifact::Plot { spec: p1 },
            ]
        );
        assert!(panel.is_visible());
    }

    #[test]
    fn test_panel_hidden_when_empty() {
        let panel = combine(Vec::new(), Vec::new());
        assert!(!panel.is_visible());
        assert_eq!(panel, ArtifactPanel::default());
    }

    #[test]
    fn test_panel_visible_with_only_figures() {
        let panel = combine(Vec::new(), vec![Figure(json!({}))]);
        assert!(panel.is_visible());
        assert_eq!(panel.len(), 1);
    }
}

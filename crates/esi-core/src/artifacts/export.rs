use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Artifact;

/// Maps a fence language tag to a file extension.
fn extension_for(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "python" | "py" => "py",
        "javascript" | "js" => "js",
        "typescript" | "ts" => "ts",
        "rust" | "rs" => "rs",
        "bash" | "sh" | "shell" | "zsh" => "sh",
        "json" => "json",
        "sql" => "sql",
        "html" => "html",
        "css" => "css",
        "markdown" | "md" => "md",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "r" => "r",
        _ => "txt",
    }
}

/// Writes every artifact into `dir`, returning the written paths in order.
///
/// Code artifacts become `artifact-{n}.{ext}`, plots become `plot-{n}.json`.
/// Numbering is 1-based and counted separately per kind.
///
/// # Errors
/// Returns an error if the directory cannot be created or a file cannot be
/// written.
pub fn export_artifacts(artifacts: &[Artifact], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(artifacts.len());
    let mut code_n = 0;
    let mut plot_n = 0;

    for artifact in artifacts {
        let (path, contents) = match artifact {
            Artifact::Code(block) => {
                code_n += 1;
                let name = format!("artifact-{code_n}.{}", extension_for(&block.language));
                (dir.join(name), block.content.clone())
            }
            Artifact::Plot { spec } => {
                plot_n += 1;
                let json = serde_json::to_string_pretty(&spec.0)
                    .context("Failed to serialize figure")?;
                (dir.join(format!("plot-{plot_n}.json")), json)
            }
        };
        fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

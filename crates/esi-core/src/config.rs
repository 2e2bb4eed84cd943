//! Configuration management for ESI.
//!
//! Loads configuration from ${ESI_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Request settings sent with every turn.
///
/// Process-wide and user-editable. The controller reads them when it
/// composes a stream request; changes never affect a turn in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model identifier forwarded to the server
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Answer verbosity level
    pub verbosity: u8,
    /// Ask the server to log tool calls
    pub debug: bool,
}

impl Settings {
    pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
    pub const DEFAULT_TEMPERATURE: f32 = 0.5;
    pub const DEFAULT_VERBOSITY: u8 = 3;
    pub const MIN_TEMPERATURE: f32 = 0.0;
    pub const MAX_TEMPERATURE: f32 = 1.0;
    pub const MIN_VERBOSITY: u8 = 1;
    pub const MAX_VERBOSITY: u8 = 5;

    /// Checks that every field lies in its domain range.
    ///
    /// # Errors
    /// Returns an error naming the first out-of-range field.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            bail!("settings.model must not be empty");
        }
        if !(Self::MIN_TEMPERATURE..=Self::MAX_TEMPERATURE).contains(&self.temperature) {
            bail!(
                "settings.temperature must be between {} and {} (got {})",
                Self::MIN_TEMPERATURE,
                Self::MAX_TEMPERATURE,
                self.temperature
            );
        }
        if !(Self::MIN_VERBOSITY..=Self::MAX_VERBOSITY).contains(&self.verbosity) {
            bail!(
                "settings.verbosity must be between {} and {} (got {})",
                Self::MIN_VERBOSITY,
                Self::MAX_VERBOSITY,
                self.verbosity
            );
        }
        Ok(())
    }

    /// Returns a copy with numeric fields clamped into range.
    ///
    /// An empty model falls back to the default model; NaN temperature
    /// falls back to the default temperature.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let model = if self.model.trim().is_empty() {
            Self::DEFAULT_MODEL.to_string()
        } else {
            self.model.trim().to_string()
        };
        let temperature = if self.temperature.is_nan() {
            Self::DEFAULT_TEMPERATURE
        } else {
            self.temperature
                .clamp(Self::MIN_TEMPERATURE, Self::MAX_TEMPERATURE)
        };
        Self {
            model,
            temperature,
            verbosity: self
                .verbosity
                .clamp(Self::MIN_VERBOSITY, Self::MAX_VERBOSITY),
            debug: self.debug,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: Self::DEFAULT_TEMPERATURE,
            verbosity: Self::DEFAULT_VERBOSITY,
            debug: false,
        }
    }
}

/// Server endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub stream_path: String,
    pub figures_path: String,
    pub upload_path: String,
    pub thinking_path: String,
    /// Timeout for non-streaming requests in seconds (0 disables)
    pub request_timeout_secs: u32,
}

impl ServerConfig {
    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            stream_path: "/chat/stream".to_string(),
            figures_path: "/figures".to_string(),
            upload_path: "/upload".to_string(),
            thinking_path: "/thinking".to_string(),
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Conversation storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Save conversations to disk
    pub save: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { save: true }
    }
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// This ensures new comments/sections from the template are always present,
/// while preserving user's customized values.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;

    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for ESI configuration and data directories.
    //!
    //! ESI_HOME resolution order:
    //! 1. ESI_HOME environment variable (if set)
    //! 2. ~/.config/esi (default)
    //! 3. ./.esi when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the ESI home directory.
    pub fn esi_home() -> PathBuf {
        if let Ok(home) = std::env::var("ESI_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".esi"),
            |h| h.join(".config").join("esi"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        esi_home().join("config.toml")
    }

    /// Returns the path to the conversations directory.
    pub fn conversations_dir() -> PathBuf {
        esi_home().join("conversations")
    }

    /// Returns the path to the log directory.
    pub fn logs_dir() -> PathBuf {
        esi_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server endpoints.
    pub server: ServerConfig,

    /// Request settings for new turns.
    pub settings: Settings,

    /// Conversation storage.
    pub storage: StorageConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or holds
    /// out-of-range settings.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        Ok(config)
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Saves the `[settings]` table to the default config file.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or written.
    pub fn save_settings(settings: &Settings) -> Result<()> {
        Self::save_settings_to(&paths::config_path(), settings)
    }

    /// Saves the `[settings]` table to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template so other
    /// keys and comments are preserved.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read, parsed or written.
    pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            merge_with_template(&user_config)?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        doc["settings"]["model"] = value(settings.model.as_str());
        doc["settings"]["temperature"] = value(f64::from(settings.temperature));
        doc["settings"]["verbosity"] = value(i64::from(settings.verbosity));
        doc["settings"]["debug"] = value(settings.debug);

        Self::write_config(path, &doc.to_string())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

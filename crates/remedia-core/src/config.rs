//! Pipeline configuration.
//!
//! Settings load from an optional TOML file under the platform config
//! directory, with `REMEDIA_*` environment variables taking precedence.
//! Every field has a usable default so a bare installation works against a
//! local assistant service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RemediaError, Result};

/// Default assistant service endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default speech synthesis provider id.
pub const DEFAULT_TTS_PROVIDER: &str = "openai";

/// Default capability profile sent as `tool_choice`.
pub const DEFAULT_TOOL_CHOICE: &str = "main";

/// Connection and send-preference settings for the assistant service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Base URL of the assistant service.
    pub base_url: String,
    /// Request deadline in seconds.
    pub request_timeout_secs: u64,
    /// Whether interactive sends request synthesized speech.
    pub output_audio: bool,
    /// Speech synthesis provider id.
    pub tts_provider: String,
    /// Capability profile for the assistant.
    pub tool_choice: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            output_audio: true,
            tts_provider: DEFAULT_TTS_PROVIDER.to_string(),
            tool_choice: DEFAULT_TOOL_CHOICE.to_string(),
        }
    }
}

impl AssistantConfig {
    /// Loads configuration from the default location with environment
    /// overrides applied. A missing file yields defaults, not an error.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_path(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Loads configuration from a specific TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// The default config file location (`<config_dir>/remedia/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("remedia").join("config.toml"))
    }

    /// Applies `REMEDIA_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("REMEDIA_BASE_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(secs) = std::env::var("REMEDIA_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.request_timeout_secs = secs;
            }
        }
        if let Ok(flag) = std::env::var("REMEDIA_OUTPUT_AUDIO") {
            if let Ok(flag) = flag.parse() {
                self.output_audio = flag;
            }
        }
        if let Ok(provider) = std::env::var("REMEDIA_TTS_PROVIDER") {
            if !provider.is_empty() {
                self.tts_provider = provider;
            }
        }
        if let Ok(profile) = std::env::var("REMEDIA_TOOL_CHOICE") {
            if !profile.is_empty() {
                self.tool_choice = profile;
            }
        }
    }

    /// The request deadline as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validates field values that have no sensible fallback.
    ///
    /// # Errors
    ///
    /// Returns a config error for an empty base URL or a zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(RemediaError::config("base_url must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(RemediaError::config("request_timeout_secs must be positive"));
        }
        Ok(())
    }
}

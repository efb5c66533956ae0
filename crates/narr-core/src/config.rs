//! Narrator configuration
//!
//! Loaded from TOML; every section and key is optional.
//!
//! ```toml
//! [backend]
//! base_url = "http://127.0.0.1:5000/api/v1/nadia"
//! timeout_secs = 60
//!
//! [playback]
//! voice_mode = "local"
//! silent_stage_delay_ms = 2000
//!
//! [focus]
//! pulse_clear_ms = 2500
//!
//! [linker]
//! max_candidates = 500
//! ```

use crate::backend::VoiceMode;
use crate::error::ConfigError;
use narr_graph::FocusConfig;
use narr_script::LinkerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    /// Service endpoints
    pub backend: BackendConfig,
    /// Pacing and voice
    pub playback: PlaybackConfig,
    /// Focus animation
    pub focus: FocusConfig,
    /// Entity auto-linking
    pub linker: LinkerConfig,
}

impl NarratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML and validate
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on bad values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    ///
    /// # Errors
    /// `ConfigError::Io` if unreadable, otherwise as [`Self::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With backend section
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// With playback section
    #[inline]
    #[must_use]
    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    /// With focus section
    #[inline]
    #[must_use]
    pub fn with_focus(mut self, focus: FocusConfig) -> Self {
        self.focus = focus;
        self
    }

    /// With linker section
    #[inline]
    #[must_use]
    pub fn with_linker(mut self, linker: LinkerConfig) -> Self {
        self.linker = linker;
        self
    }

    /// Reject values the narrator cannot run with
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.backend.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::Invalid {
                field: "backend.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "backend.base_url",
                reason: format!("not an http(s) url: {base}"),
            });
        }
        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "backend.timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if !(self.focus.zoom.is_finite() && self.focus.zoom > 0.0) {
            return Err(ConfigError::Invalid {
                field: "focus.zoom",
                reason: format!("must be a positive number, got {}", self.focus.zoom),
            });
        }
        Ok(())
    }
}

/// Service endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the narrator API
    pub base_url: String,
    /// Chat endpoint, relative to `base_url`
    pub chat_path: String,
    /// Synthesis endpoint
    pub audio_path: String,
    /// Usage endpoint
    pub usage_path: String,
    /// Request timeout
    pub timeout_secs: u64,
    /// Job whose graph is discussed
    pub job_id: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api/v1/nadia".to_string(),
            chat_path: "chat".to_string(),
            audio_path: "audio".to_string(),
            usage_path: "usage".to_string(),
            timeout_secs: 120,
            job_id: None,
        }
    }
}

impl BackendConfig {
    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// With job id
    #[inline]
    #[must_use]
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for an endpoint path
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Pacing and voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Voice mode new sessions start with
    pub voice_mode: VoiceMode,
    /// Stage interval while a premium clip plays
    pub premium_stage_interval_ms: u64,
    /// Delay between stages without audio
    pub silent_stage_delay_ms: u64,
    /// Dwell on command-only stages during incremental playback
    pub command_only_dwell_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            voice_mode: VoiceMode::None,
            premium_stage_interval_ms: 4_000,
            silent_stage_delay_ms: 2_500,
            command_only_dwell_ms: 1_200,
        }
    }
}

impl PlaybackConfig {
    /// With voice mode
    #[inline]
    #[must_use]
    pub fn with_voice_mode(mut self, voice: VoiceMode) -> Self {
        self.voice_mode = voice;
        self
    }

    /// With premium pacing interval
    #[inline]
    #[must_use]
    pub fn with_premium_interval_ms(mut self, ms: u64) -> Self {
        self.premium_stage_interval_ms = ms;
        self
    }

    /// With silent inter-stage delay
    #[inline]
    #[must_use]
    pub fn with_silent_delay_ms(mut self, ms: u64) -> Self {
        self.silent_stage_delay_ms = ms;
        self
    }

    /// With command-only dwell
    #[inline]
    #[must_use]
    pub fn with_command_dwell_ms(mut self, ms: u64) -> Self {
        self.command_only_dwell_ms = ms;
        self
    }

    /// Premium pacing interval
    #[inline]
    #[must_use]
    pub fn premium_interval(&self) -> Duration {
        Duration::from_millis(self.premium_stage_interval_ms)
    }

    /// Silent inter-stage delay
    #[inline]
    #[must_use]
    pub fn silent_delay(&self) -> Duration {
        Duration::from_millis(self.silent_stage_delay_ms)
    }

    /// Command-only dwell
    #[inline]
    #[must_use]
    pub fn command_dwell(&self) -> Duration {
        Duration::from_millis(self.command_only_dwell_ms)
    }
}

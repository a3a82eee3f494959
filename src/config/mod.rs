//! Configuration management.

use crate::debounce::DEFAULT_QUIET_WINDOW;
use crate::models::SessionMode;
use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for the configurable quiet window (ms).
///
/// Past a few seconds the debounce stops feeling like coalescing and starts
/// feeling like lost navigation.
const MAX_QUIET_WINDOW_MS: u64 = 5_000;

/// Main configuration for slidemark.
#[derive(Debug, Clone)]
pub struct SlidemarkConfig {
    /// Base directory for per-document annotation folders.
    pub data_dir: PathBuf,
    /// Quiet window for navigation debouncing.
    pub quiet_window: Duration,
    /// Whether to offer resuming at the last shown page on document open.
    pub resume_last_page: bool,
    /// Annotation mode the session runs in.
    pub mode: SessionMode,
}

impl Default for SlidemarkConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            quiet_window: DEFAULT_QUIET_WINDOW,
            resume_last_page: true,
            mode: SessionMode::Presentation,
        }
    }
}

impl SlidemarkConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// anything the file leaves out.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, fails to parse, or
    /// contains out-of-range values.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::op("read_config_file", e))?;
        let file: ConfigFile =
            toml::from_str(&raw).map_err(|e| Error::op("parse_config_file", e))?;
        file.into_config()
    }
}

/// On-disk configuration file shape.
///
/// Every field is optional; missing values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Base directory for per-document annotation folders.
    pub data_dir: Option<PathBuf>,
    /// Quiet window for navigation debouncing, in milliseconds.
    pub quiet_window_ms: Option<u64>,
    /// Whether to offer resuming at the last shown page.
    pub resume_last_page: Option<bool>,
    /// Annotation mode: `"presentation"` or `"whiteboard"`.
    pub mode: Option<String>,
}

impl ConfigFile {
    /// Resolves the file against defaults into a full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown mode or an
    /// out-of-range quiet window.
    pub fn into_config(self) -> Result<SlidemarkConfig> {
        let defaults = SlidemarkConfig::default();

        let quiet_window = match self.quiet_window_ms {
            None => defaults.quiet_window,
            Some(ms) if ms <= MAX_QUIET_WINDOW_MS => Duration::from_millis(ms),
            Some(ms) => {
                return Err(Error::InvalidInput(format!(
                    "quiet_window_ms {ms} exceeds maximum of {MAX_QUIET_WINDOW_MS}"
                )));
            }
        };

        let mode = match self.mode {
            None => defaults.mode,
            Some(raw) => SessionMode::parse(&raw)
                .ok_or_else(|| Error::InvalidInput(format!("unknown session mode: {raw}")))?,
        };

        Ok(SlidemarkConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            quiet_window,
            resume_last_page: self.resume_last_page.unwrap_or(defaults.resume_last_page),
            mode,
        })
    }
}

/// Platform data directory, with a dotfolder fallback.
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "slidemark").map_or_else(
        || PathBuf::from(".slidemark"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

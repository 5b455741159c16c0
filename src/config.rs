//! Engine tuning knobs.
//!
//! The defaults suit multi-gigabyte files: loads read 64 KiB at a time and check
//! for cancellation once per chunk, searches and exports check every few
//! thousand lines. With the `config` feature enabled the same settings can be
//! read from a TOML file; the engine never writes settings back.

#[cfg(feature = "config")]
use crate::error::{LogsiftError, Result};
#[cfg(feature = "config")]
use std::path::{Path, PathBuf};

/// Settings shared by every operation the engine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EngineConfig {
    /// Lines marked as context before and after each match
    pub context_lines: usize,

    /// Bytes read per chunk while indexing a file
    pub read_chunk_size: usize,

    /// Lines processed between cancellation checks during search and export
    pub cancel_check_interval: usize,

    /// Capacity of the buffered writer used by exports
    pub write_buffer_size: usize,
}

impl EngineConfig {
    pub const DEFAULT_CONTEXT_LINES: usize = 2;
    pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;
    pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 4096;
    pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

    /// Clamp values that would stall an operation (zero-sized chunks or intervals)
    pub fn normalized(mut self) -> Self {
        self.read_chunk_size = self.read_chunk_size.max(1);
        self.cancel_check_interval = self.cancel_check_interval.max(1);
        self.write_buffer_size = self.write_buffer_size.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_lines: Self::DEFAULT_CONTEXT_LINES,
            read_chunk_size: Self::DEFAULT_READ_CHUNK_SIZE,
            cancel_check_interval: Self::DEFAULT_CANCEL_CHECK_INTERVAL,
            write_buffer_size: Self::DEFAULT_WRITE_BUFFER_SIZE,
        }
    }
}

#[cfg(feature = "config")]
impl EngineConfig {
    /// Parse settings from TOML text; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| LogsiftError::config(format!("Invalid configuration: {}", e)))?;
        Ok(config.normalized())
    }

    /// Read settings from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LogsiftError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// `<user config dir>/logsift/config.toml`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("logsift").join("config.toml"))
    }

    /// Read the default config file, falling back to defaults when it is absent
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hierarchy undo/redo settings.
//!
//! Settings are stored as RON. Missing fields fall back to their defaults so
//! older settings files keep loading.

use crate::history::MAX_HISTORY;
use crate::snapshot::{SnapshotCodec, SnapshotEncoding};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The RON text could not be parsed
    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The settings could not be serialized
    #[error("Config serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Reading or writing the settings file failed
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings for the hierarchy undo/redo core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Maximum number of commands kept on the undo stack
    pub max_history: usize,
    /// Encoding for undo/redo snapshots; the clipboard always uses text
    pub undo_encoding: SnapshotEncoding,
    /// Pretty-print clipboard text
    pub pretty_text: bool,
    /// Sleep between asset pumps while waiting for a restore
    pub restore_poll_interval_ms: u64,
    /// Give up waiting for a restore after this long
    pub restore_timeout_ms: u64,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY,
            undo_encoding: SnapshotEncoding::Binary,
            pretty_text: true,
            restore_poll_interval_ms: 10,
            restore_timeout_ms: 5000,
        }
    }
}

impl HierarchyConfig {
    /// Parse settings from RON text
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(s)?)
    }

    /// Serialize settings to pretty RON text
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!("Loaded hierarchy settings from {:?}", path);
        Ok(config)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        tracing::info!("Saved hierarchy settings to {:?}", path);
        Ok(())
    }

    /// Codec used for undo/redo snapshots
    pub fn undo_codec(&self) -> SnapshotCodec {
        SnapshotCodec::new(self.undo_encoding)
    }

    /// Codec used for clipboard text
    pub fn clipboard_codec(&self) -> SnapshotCodec {
        SnapshotCodec::text().with_pretty(self.pretty_text)
    }

    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.restore_poll_interval_ms)
    }

    /// Restore timeout as a duration
    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }
}

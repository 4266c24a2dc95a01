//! Editor configuration, read from YAML.
//!
//! ```yaml
//! encoding: shift_jis
//! enable-ruby: true
//! blink-interval-ms: 400
//! advance-on-record: true
//! ```
//!
//! Every key is optional.

use crate::error::KaraError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Declared encoding for load and export.
    pub encoding: String,
    /// Initial ruby mode.
    pub enable_ruby: bool,
    pub blink_interval_ms: u64,
    /// Move the cursor right after recording a timestamp.
    pub advance_on_record: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            encoding: "shift_jis".to_string(),
            enable_ruby: false,
            blink_interval_ms: 500,
            advance_on_record: true,
        }
    }
}

impl EditorConfig {
    pub fn from_yaml(content: &str) -> Result<Self, KaraError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| KaraError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, KaraError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }
}

//! Addon Configuration: the write/enforcement pipeline's JSON-configurable
//! settings, loaded via `serde_json` from a file or built with `Default`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on candidate count for which auto-writes are allowed, absent
/// any config file.
pub const DEFAULT_AUTO_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonConfig {
    pub auto_threshold: u32,
    pub dry_run: bool,
    pub log_path: Option<String>,
    pub enforce_interval: f64,
    pub patch_value: Option<f64>,
    pub patch_type: Option<String>,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            auto_threshold: DEFAULT_AUTO_THRESHOLD,
            dry_run: true,
            log_path: None,
            enforce_interval: 0.0,
            patch_value: None,
            patch_type: None,
        }
    }
}

impl AddonConfig {
    /// Loads config from a JSON file, falling back to `Default` field-by-field
    /// for any key the file omits (via `#[serde(default)]`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::InvalidInput(format!("cannot read addon config: {e}")))?;
        serde_json::from_str(&text).map_err(|e| Error::InvalidInput(format!("malformed addon config: {e}")))
    }

    /// Whether the enforcement loop should run after a batch write.
    pub fn wants_enforcement(&self) -> bool {
        self.enforce_interval > 0.0
    }
}

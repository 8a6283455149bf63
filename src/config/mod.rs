pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted user preferences. Everything in here survives restarts; the
/// tag index, selection, and workflow phase deliberately do not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Root directory of the previous session, restored on startup.
    pub last_root: Option<PathBuf>,
    /// Scan-time visibility threshold for the tag index.
    pub min_count: usize,
    /// Case-insensitive banned-rule matching.
    pub case_insensitive: bool,
    /// Sort surviving tag lines alphabetically when rewriting files.
    pub sort_lines: bool,
    /// Suggested filename for exported banned-rule lists.
    pub banned_export_filename: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }

    pub fn save(&self) -> Result<()> {
        settings::save_config(self, None)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            last_root: None,
            min_count: 5,
            case_insensitive: false,
            sort_lines: false,
            banned_export_filename: "banned_tags.txt".to_string(),
        }
    }
}

//! The request/response contracts of the scan, preview, and apply operations.
//!
//! Field names are the wire contract. Responses carry redundant aggregate
//! counters and are validated for internal consistency before the workflow
//! controller accepts them, so a malformed payload fails loudly instead of
//! propagating undefined values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::CoreError;
use super::TagIndex;

fn default_min_count() -> usize {
    5
}

/// Request for a directory scan building a fresh [`TagIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanRequest {
    pub root_path: String,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
    #[serde(default)]
    pub banned_rules: Vec<String>,
    #[serde(default)]
    pub case_insensitive: bool,
}

impl ScanRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_count < 1 {
            return Err(CoreError::InvalidRequest(
                "min_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Response to a scan: every tag file found plus the aggregated counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub files_found: Vec<String>,
    pub total_files: usize,
    pub counts: TagIndex,
}

impl ScanResponse {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.total_files != self.files_found.len() {
            return Err(CoreError::Contract(format!(
                "total_files is {} but {} files were listed",
                self.total_files,
                self.files_found.len()
            )));
        }
        Ok(())
    }
}

/// Request shape shared by the read-only preview and the destructive apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreviewRequest {
    pub root_path: String,
    /// Explicitly checked tags, namespace to tag list. Tags no longer present
    /// on disk are silently ignored by the engine.
    #[serde(default)]
    pub selected_to_remove: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub banned_rules: Vec<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    #[serde(default)]
    pub sort_lines: bool,
}

/// Apply takes the identical request shape as preview.
pub type ApplyRequest = PreviewRequest;

/// The before/after line snapshots for one changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreview {
    pub file: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
    /// Number of tag occurrences removed from this file, counted
    /// per occurrence rather than per distinct tag.
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub files_modified: usize,
    pub tags_removed: usize,
    pub previews: Vec<FilePreview>,
}

impl PreviewResponse {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.files_modified != self.previews.len() {
            return Err(CoreError::Contract(format!(
                "files_modified is {} but {} previews were returned",
                self.files_modified,
                self.previews.len()
            )));
        }
        let removed: usize = self.previews.iter().map(|p| p.removed).sum();
        if self.tags_removed != removed {
            return Err(CoreError::Contract(format!(
                "tags_removed is {} but previews account for {}",
                self.tags_removed, removed
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub backup_path: String,
    pub files_modified: usize,
    pub tags_removed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn scan_request_rejects_zero_min_count() {
        let request = ScanRequest {
            root_path: "/tmp".to_string(),
            min_count: 0,
            banned_rules: Vec::new(),
            case_insensitive: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn scan_request_defaults_apply() {
        let request: ScanRequest = serde_json::from_str(r#"{"root_path": "/data"}"#).unwrap();
        assert_eq!(request.min_count, 5);
        assert!(request.banned_rules.is_empty());
        assert!(!request.case_insensitive);
        request.validate().unwrap();
    }

    #[test]
    fn unknown_request_fields_are_rejected() {
        let raw = r#"{"root_path": "/data", "selected": {}}"#;
        assert!(serde_json::from_str::<PreviewRequest>(raw).is_err());
    }

    #[test]
    fn scan_response_counter_mismatch_fails_validation() {
        let response = ScanResponse {
            files_found: vec!["a.txt".to_string()],
            total_files: 2,
            counts: BTreeMap::new(),
        };
        assert!(matches!(
            response.validate(),
            Err(crate::core::CoreError::Contract(_))
        ));
    }

    #[test]
    fn preview_response_counters_must_agree_with_previews() {
        let response = PreviewResponse {
            files_modified: 1,
            tags_removed: 3,
            previews: vec![FilePreview {
                file: "a.txt".to_string(),
                before: vec!["water".to_string()],
                after: Vec::new(),
                removed: 1,
            }],
        };
        assert!(response.validate().is_err());
    }
}

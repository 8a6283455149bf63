//! Discovery of tag log files and aggregation of the tag index.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::error::CoreError;
use super::protocol::{ScanRequest, ScanResponse};
use super::rules::RuleMatcher;
use super::tags::{parse_tag_line, TagLine};
use super::TagIndex;

/// File extension (case-insensitive) that marks a file as a tag log.
pub const TAG_FILE_EXTENSION: &str = "txt";

/// Directory under the scan root that holds apply backups. Excluded from
/// traversal so an apply never rewrites its own backups.
pub const BACKUP_DIR_NAME: &str = ".taglog_backups";

fn is_tag_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(TAG_FILE_EXTENSION))
}

/// Recursively collects all tag log files under `root` in deterministic
/// (sorted) order. Hidden files are included; only the backup directory is
/// skipped. Unreadable entries are logged and ignored rather than failing
/// the whole scan.
pub fn collect_tag_files(root: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !root.is_dir() {
        return Err(CoreError::InvalidRoot(root.to_path_buf()));
    }

    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != std::ffi::OsStr::new(BACKUP_DIR_NAME))
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry during scan: {}", e);
                continue;
            }
        };
        if entry.file_type().is_some_and(|t| t.is_file()) && is_tag_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads a tag log file into parsed tag lines. Invalid UTF-8 is replaced
/// rather than rejected; tag logs in the wild carry mixed encodings.
pub fn load_tag_lines(path: &Path) -> Result<Vec<TagLine>, CoreError> {
    let bytes = fs::read(path).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.lines().filter_map(parse_tag_line).collect())
}

/// Scans `root_path` and builds a fresh [`TagIndex`].
///
/// Occurrences matching a banned rule are excluded from the counts, and tags
/// below `min_count` are omitted from the returned index. The threshold is a
/// visibility filter only; it does not protect a tag from banned-rule removal
/// in a later preview or apply.
pub fn scan_directory(request: &ScanRequest) -> Result<ScanResponse, CoreError> {
    request.validate()?;
    let root = Path::new(&request.root_path);
    let files = collect_tag_files(root)?;
    let matcher = RuleMatcher::new(&request.banned_rules, request.case_insensitive)?;

    let per_file: Vec<Vec<TagLine>> = files
        .par_iter()
        .map(|path| load_tag_lines(path))
        .collect::<Result<_, _>>()?;

    let mut counts = TagIndex::new();
    for lines in &per_file {
        for line in lines {
            if matcher.matches(&line.namespace, &line.tag) {
                continue;
            }
            *counts
                .entry(line.namespace.clone())
                .or_insert_with(BTreeMap::new)
                .entry(line.tag.clone())
                .or_insert(0) += 1;
        }
    }
    let counts = filter_by_min_count(counts, request.min_count);

    tracing::info!(
        files = files.len(),
        namespaces = counts.len(),
        "Scan complete"
    );

    Ok(ScanResponse {
        total_files: files.len(),
        files_found: files
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        counts,
    })
}

/// Drops tags below the threshold and namespaces left empty by that.
fn filter_by_min_count(counts: TagIndex, min_count: usize) -> TagIndex {
    counts
        .into_iter()
        .filter_map(|(ns, tags)| {
            let kept: BTreeMap<String, usize> = tags
                .into_iter()
                .filter(|(_, count)| *count >= min_count)
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some((ns, kept))
            }
        })
        .collect()
}

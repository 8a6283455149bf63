//! The tag removal engine: per-file change computation, the read-only
//! preview, and the destructive apply with backup.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::error::CoreError;
use super::protocol::{ApplyResponse, FilePreview, PreviewRequest, PreviewResponse};
use super::rules::RuleMatcher;
use super::scanner::{collect_tag_files, BACKUP_DIR_NAME};
use super::tags::{full_key, parse_tag_line};

/// Combines the explicit selection payload with the banned-rule set into a
/// single per-occurrence removal decision.
pub struct RemovalMatcher {
    selected: HashSet<String>,
    rules: RuleMatcher,
}

impl RemovalMatcher {
    pub fn new(
        selected_to_remove: &BTreeMap<String, Vec<String>>,
        banned_rules: &[String],
        case_insensitive: bool,
    ) -> Result<Self, CoreError> {
        let selected = selected_to_remove
            .iter()
            .flat_map(|(ns, tags)| tags.iter().map(|tag| full_key(ns, tag)))
            .collect();
        Ok(Self {
            selected,
            rules: RuleMatcher::new(banned_rules, case_insensitive)?,
        })
    }

    /// Selection matches are exact on the `(namespace, tag)` pair; the case
    /// flag governs banned rules only, since selections originate from the
    /// index itself.
    pub fn should_remove(&self, namespace: &str, tag: &str) -> bool {
        self.selected.contains(&full_key(namespace, tag)) || self.rules.matches(namespace, tag)
    }
}

/// The computed change for a single file.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub removed: usize,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl FileChange {
    fn into_preview(self) -> FilePreview {
        FilePreview {
            file: self.path.to_string_lossy().to_string(),
            before: self.before,
            after: self.after,
            removed: self.removed,
        }
    }
}

/// Computes the change a removal pass would make to one file.
///
/// `before` and `after` are full-file line snapshots. Blank lines and lines
/// with an empty tag part never reach either snapshot; dropping them counts
/// as a change but not as a removed tag. Returns `None` when the rewrite
/// would be byte-identical.
pub fn process_file(
    path: &Path,
    matcher: &RemovalMatcher,
    sort_lines: bool,
) -> Result<Option<FileChange>, CoreError> {
    let bytes = fs::read(path).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    let text = String::from_utf8_lossy(&bytes);

    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut removed = 0;

    for raw in text.lines() {
        let Some(parsed) = parse_tag_line(raw) else {
            continue;
        };
        before.push(raw.trim_end().to_string());
        if matcher.should_remove(&parsed.namespace, &parsed.tag) {
            removed += 1;
            continue;
        }
        after.push(parsed.render());
    }
    if sort_lines {
        after.sort();
    }

    if after == before {
        return Ok(None);
    }
    Ok(Some(FileChange {
        path: path.to_path_buf(),
        removed,
        before,
        after,
    }))
}

fn compute_changes(request: &PreviewRequest) -> Result<Vec<FileChange>, CoreError> {
    let root = Path::new(&request.root_path);
    let files = collect_tag_files(root)?;
    let matcher = RemovalMatcher::new(
        &request.selected_to_remove,
        &request.banned_rules,
        request.case_insensitive,
    )?;

    let changes: Vec<Option<FileChange>> = files
        .par_iter()
        .map(|path| process_file(path, &matcher, request.sort_lines))
        .collect::<Result<_, _>>()?;
    Ok(changes.into_iter().flatten().collect())
}

/// Computes the full diff a removal pass would produce, without touching the
/// file system. Idempotent for unchanged inputs and files.
pub fn preview_changes(request: &PreviewRequest) -> Result<PreviewResponse, CoreError> {
    let changes = compute_changes(request)?;
    Ok(PreviewResponse {
        files_modified: changes.len(),
        tags_removed: changes.iter().map(|c| c.removed).sum(),
        previews: changes.into_iter().map(FileChange::into_preview).collect(),
    })
}

/// Applies the removal pass destructively.
///
/// Two phases: every changed file is first copied into one timestamped backup
/// directory, and only after all backups exist are the rewritten files
/// written. The returned counters equal those an immediately preceding
/// preview with the same inputs would have reported.
pub fn apply_changes(request: &PreviewRequest) -> Result<ApplyResponse, CoreError> {
    let root = Path::new(&request.root_path);
    let changes = compute_changes(request)?;
    let backup_dir = root
        .join(BACKUP_DIR_NAME)
        .join(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&backup_dir).map_err(|e| CoreError::Io(e, backup_dir.clone()))?;

    for change in &changes {
        let relative = change.path.strip_prefix(root)?;
        let destination = backup_dir.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::Io(e, parent.to_path_buf()))?;
        }
        fs::copy(&change.path, &destination)
            .map_err(|e| CoreError::Io(e, change.path.clone()))?;
    }

    for change in &changes {
        write_lines(&change.path, &change.after)?;
    }

    tracing::info!(
        files_modified = changes.len(),
        backup = %backup_dir.display(),
        "Apply complete"
    );

    Ok(ApplyResponse {
        backup_path: backup_dir.to_string_lossy().to_string(),
        files_modified: changes.len(),
        tags_removed: changes.iter().map(|c| c.removed).sum(),
    })
}

/// Writes lines with `\n` endings and a trailing newline.
fn write_lines(path: &Path, lines: &[String]) -> Result<(), CoreError> {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).map_err(|e| CoreError::Io(e, path.to_path_buf()))
}

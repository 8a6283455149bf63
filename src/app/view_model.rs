//! Responsible for transforming the `AppState` into a `UiState` view model.
//!
//! This module acts as a presentation layer: it projects the tag index into
//! display groups, applies the search filter, and computes the counters a
//! frontend renders. The projection is read-only; it never mutates state.

use serde::Serialize;

use super::selection::Selection;
use super::state::{AppState, WorkflowPhase};
use crate::core::TagIndex;

/// A serializable representation of the application state for the UI.
#[derive(Serialize, Clone, Debug)]
pub struct UiState {
    pub root_path: String,
    pub min_count: usize,
    pub case_insensitive: bool,
    pub sort_lines: bool,
    pub banned_text: String,
    pub search_query: String,
    /// Namespaces in lexicographic order, already filtered by the search
    /// query; namespaces with no matching tags are omitted.
    pub namespaces: Vec<NamespaceGroup>,
    pub total_files: usize,
    pub visible_tag_count: usize,
    pub selected_tag_count: usize,
    pub phase: WorkflowPhase,
    pub is_busy: bool,
    pub status_message: String,
    pub last_backup_path: Option<String>,
}

/// One namespace section of the tag list.
#[derive(Serialize, Clone, Debug)]
pub struct NamespaceGroup {
    pub name: String,
    pub tags: Vec<TagRow>,
}

/// One tag row: name, occurrence count, and whether it is checked.
#[derive(Serialize, Clone, Debug)]
pub struct TagRow {
    pub name: String,
    pub count: usize,
    pub selected: bool,
}

/// Creates the complete `UiState` from the current `AppState`.
pub fn generate_ui_state(state: &AppState) -> UiState {
    let namespaces = project_tag_index(&state.counts, &state.search_query, &state.selection);
    let visible_tag_count = namespaces.iter().map(|group| group.tags.len()).sum();

    UiState {
        root_path: state.root_path.clone(),
        min_count: state.min_count,
        case_insensitive: state.case_insensitive,
        sort_lines: state.sort_lines,
        banned_text: state.banned_text.clone(),
        search_query: state.search_query.clone(),
        namespaces,
        total_files: state.total_files,
        visible_tag_count,
        selected_tag_count: state.selection.len(),
        phase: state.phase,
        is_busy: state.is_busy(),
        status_message: state.status_message.clone(),
        last_backup_path: state
            .last_apply
            .as_ref()
            .map(|apply| apply.backup_path.clone()),
    }
}

/// Projects the index into display groups. The search query matches tags by
/// case-insensitive substring; `min_count` was already applied at scan time.
fn project_tag_index(counts: &TagIndex, search: &str, selection: &Selection) -> Vec<NamespaceGroup> {
    let needle = search.to_lowercase();
    counts
        .iter()
        .filter_map(|(namespace, tags)| {
            let rows: Vec<TagRow> = tags
                .iter()
                .filter(|(tag, _)| needle.is_empty() || tag.to_lowercase().contains(&needle))
                .map(|(tag, count)| TagRow {
                    name: tag.clone(),
                    count: *count,
                    selected: selection.contains(namespace, tag),
                })
                .collect();
            if rows.is_empty() {
                None
            } else {
                Some(NamespaceGroup {
                    name: namespace.clone(),
                    tags: rows,
                })
            }
        })
        .collect()
}

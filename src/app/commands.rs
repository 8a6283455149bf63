//! Contains the handlers for all IPC commands received from the frontend.
//!
//! Each handler parses its payload, mutates the shared `AppState`, and
//! notifies the frontend with a fresh `UiState`. The scan, preview, and
//! apply triggers delegate to the async tasks in [`super::tasks`].

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;

use super::events::UserEvent;
use super::helpers::with_state_and_notify;
use super::proxy::EventProxy;
use super::state::AppState;
use super::tasks::{self, TagLogService};
use crate::core::rules;

/// Parses a command payload, reporting malformed input to the frontend.
fn parse_payload<T: serde::de::DeserializeOwned>(
    payload: Value,
    proxy: &impl EventProxy,
) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Malformed command payload: {}", e);
            proxy.send_event(UserEvent::ShowError(format!("Invalid request: {e}")));
            None
        }
    }
}

/// Handles the `initialize` message from the frontend, pushing the first
/// full state snapshot (including any root path restored from the saved
/// configuration).
pub fn initialize(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>) {
    with_state_and_notify(state, proxy, |state| {
        if state.root_path.is_empty() {
            if let Some(last_root) = state.config.last_root.clone() {
                state.root_path = last_root.to_string_lossy().into_owned();
            }
        }
        tracing::info!("Frontend initialized");
    });
}

#[derive(Deserialize)]
struct SetRootPayload {
    path: String,
}

/// Switches the session to a new root directory.
///
/// Deliberately not gated on the busy flag: resetting bumps the request
/// epoch, which makes any in-flight operation's response stale on arrival.
pub fn set_root_path(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>, payload: Value) {
    let Some(SetRootPayload { path }) = parse_payload(payload, proxy) else {
        return;
    };
    with_state_and_notify(state, proxy, |state| {
        tracing::info!(root = %path, "Root path changed");
        state.reset_root(path);
        if let Err(e) = state.config.save() {
            tracing::warn!("Failed to save configuration: {}", e);
        }
    });
}

#[derive(Deserialize)]
struct UpdateOptionsPayload {
    min_count: Option<usize>,
    case_insensitive: Option<bool>,
    sort_lines: Option<bool>,
}

/// Updates the scan and rewrite tunables. Fields absent from the payload
/// keep their current values. Changes take effect on the next operation;
/// `min_count` in particular never re-filters an existing index.
pub fn update_options(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>, payload: Value) {
    let Some(options) = parse_payload::<UpdateOptionsPayload>(payload, proxy) else {
        return;
    };
    with_state_and_notify(state, proxy, |state| {
        if let Some(min_count) = options.min_count {
            state.min_count = min_count.max(1);
            state.config.min_count = state.min_count;
        }
        if let Some(case_insensitive) = options.case_insensitive {
            state.case_insensitive = case_insensitive;
            state.config.case_insensitive = case_insensitive;
        }
        if let Some(sort_lines) = options.sort_lines {
            state.sort_lines = sort_lines;
            state.config.sort_lines = sort_lines;
        }
        if let Err(e) = state.config.save() {
            tracing::warn!("Failed to save configuration: {}", e);
        }
    });
}

#[derive(Deserialize)]
struct BannedTextPayload {
    text: String,
}

/// Replaces the banned-rules text wholesale. The text is the single source
/// of truth; parsing happens when the next request is built.
pub fn update_banned_text(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>, payload: Value) {
    let Some(BannedTextPayload { text }) = parse_payload(payload, proxy) else {
        return;
    };
    with_state_and_notify(state, proxy, |state| {
        state.banned_text = text;
    });
}

#[derive(Deserialize)]
struct SearchPayload {
    query: String,
}

/// Updates the tag list search filter.
pub fn update_search(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>, payload: Value) {
    let Some(SearchPayload { query }) = parse_payload(payload, proxy) else {
        return;
    };
    with_state_and_notify(state, proxy, |state| {
        state.search_query = query;
    });
}

#[derive(Deserialize)]
struct ToggleTagPayload {
    namespace: String,
    tag: String,
}

/// Toggles a tag's selection for removal.
///
/// Rejected while an operation is in flight, and for tags not present in
/// the current index (a stale frontend click after a re-scan).
pub fn toggle_tag(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>, payload: Value) {
    let Some(ToggleTagPayload { namespace, tag }) = parse_payload(payload, proxy) else {
        return;
    };
    with_state_and_notify(state, proxy, |state| {
        if state.is_busy() {
            tracing::warn!("Ignoring selection toggle while an operation is in flight");
            return;
        }
        let known = state
            .counts
            .get(&namespace)
            .is_some_and(|tags| tags.contains_key(&tag));
        if !known {
            tracing::warn!(%namespace, %tag, "Ignoring toggle for tag not in the current index");
            return;
        }
        state.selection.toggle(&namespace, &tag);
    });
}

/// Clears the entire selection.
pub fn clear_selection(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>) {
    with_state_and_notify(state, proxy, |state| {
        if state.is_busy() {
            tracing::warn!("Ignoring clear-selection while an operation is in flight");
            return;
        }
        state.selection.clear();
    });
}

/// Triggers a scan of the current root directory.
pub fn scan<P: EventProxy, S: TagLogService>(
    service: Arc<S>,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) {
    tasks::start_scan(service, proxy.clone(), state.clone());
}

/// Triggers a removal preview over the current selection and rules.
pub fn preview<P: EventProxy, S: TagLogService>(
    service: Arc<S>,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) {
    tasks::start_preview(service, proxy.clone(), state.clone());
}

/// Triggers the destructive apply.
pub fn apply<P: EventProxy, S: TagLogService>(
    service: Arc<S>,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) {
    tasks::start_apply(service, proxy.clone(), state.clone());
}

/// Hands the frontend a normalized banned-rule list to persist. The content
/// is the parsed form re-serialized, so stray blanks and padding are gone.
pub fn export_banned_rules(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>) {
    let state_guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");
    let content = rules::serialize(&state_guard.banned_rules());
    let filename = state_guard.config.banned_export_filename.clone();
    drop(state_guard);
    proxy.send_event(UserEvent::BannedRulesExported { filename, content });
}

#[derive(Deserialize)]
struct ImportRulesPayload {
    content: String,
}

/// Replaces the banned-rules text with the contents of an imported file.
pub fn import_banned_rules(proxy: &impl EventProxy, state: &Arc<Mutex<AppState>>, payload: Value) {
    let Some(ImportRulesPayload { content }) = parse_payload(payload, proxy) else {
        return;
    };
    with_state_and_notify(state, proxy, |state| {
        let rule_count = rules::parse(&content).len();
        state.banned_text = content;
        state.status_message = format!("Imported {rule_count} banned rules");
    });
}

//! Defines the central, mutable state of the application.

use serde::Serialize;
use tokio::task::JoinHandle;

use super::selection::Selection;
use crate::config::AppConfig;
use crate::core::protocol::{ApplyResponse, PreviewRequest, PreviewResponse, ScanRequest};
use crate::core::{rules, TagIndex};

/// Where the workflow currently stands.
///
/// In-flight phases fail back to the stable phase recorded when they were
/// entered, carrying an error message; stable phases hold until the next
/// trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Scanning,
    Scanned,
    Previewing,
    Previewed,
    Applying,
    Applied,
}

impl WorkflowPhase {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            WorkflowPhase::Scanning | WorkflowPhase::Previewing | WorkflowPhase::Applying
        )
    }
}

/// Holds the complete, mutable state of the application.
///
/// This struct is wrapped in an `Arc<Mutex<...>>` to allow safe, shared
/// access from command handlers and the async scan/preview/apply tasks.
pub struct AppState {
    /// Persisted user preferences.
    pub config: AppConfig,
    /// The root directory of the current session.
    pub root_path: String,
    /// Scan-time visibility threshold for the tag index.
    pub min_count: usize,
    /// The editable banned-rules text; the parsed form is derived from this
    /// on every request.
    pub banned_text: String,
    /// Governs banned-rule matching for scan, preview, and apply alike.
    pub case_insensitive: bool,
    /// Sort surviving tag lines alphabetically when rewriting files.
    pub sort_lines: bool,
    /// Substring filter applied to the displayed tag list.
    pub search_query: String,
    /// Last-good tag index; replaced wholesale on a successful scan, never
    /// partially overwritten.
    pub counts: TagIndex,
    /// Total files visited by the last successful scan.
    pub total_files: usize,
    /// Tags explicitly checked for removal.
    pub selection: Selection,
    /// Current workflow phase; busy phases gate all operation triggers.
    pub phase: WorkflowPhase,
    /// Stable phase to fall back to when an in-flight operation fails.
    prior_phase: WorkflowPhase,
    /// Human-readable outcome of the last completed or failed operation.
    pub status_message: String,
    /// The most recent preview result, kept for re-display.
    pub last_preview: Option<PreviewResponse>,
    /// The most recent apply result (backup location included).
    pub last_apply: Option<ApplyResponse>,
    /// Bumped whenever session inputs are reset; a task response whose
    /// captured epoch no longer matches is stale and gets discarded.
    pub request_epoch: u64,
    /// Handle of the in-flight operation task, if any.
    pub in_flight: Option<JoinHandle<()>>,
}

impl Default for AppState {
    /// Creates a default `AppState`, seeding the tunables from the persisted
    /// configuration.
    fn default() -> Self {
        let config = AppConfig::load().unwrap_or_default();
        Self::with_config(config)
    }
}

impl AppState {
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            min_count: config.min_count,
            case_insensitive: config.case_insensitive,
            sort_lines: config.sort_lines,
            config,
            root_path: String::new(),
            banned_text: String::new(),
            search_query: String::new(),
            counts: TagIndex::new(),
            total_files: 0,
            selection: Selection::default(),
            phase: WorkflowPhase::Idle,
            prior_phase: WorkflowPhase::Idle,
            status_message: String::new(),
            last_preview: None,
            last_apply: None,
            request_epoch: 0,
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// Enters an in-flight phase, remembering where to fall back to.
    pub fn begin(&mut self, phase: WorkflowPhase) {
        debug_assert!(phase.is_busy());
        self.prior_phase = self.phase;
        self.phase = phase;
        self.status_message.clear();
    }

    /// Completes the in-flight operation successfully.
    pub fn complete(&mut self, phase: WorkflowPhase, message: String) {
        self.phase = phase;
        self.status_message = message;
        self.in_flight = None;
    }

    /// Fails the in-flight operation: revert to the prior stable phase and
    /// surface the message. All cached data stays untouched.
    pub fn fail(&mut self, message: String) {
        tracing::warn!("Operation failed, reverting to {:?}: {}", self.prior_phase, message);
        self.phase = self.prior_phase;
        self.status_message = message;
        self.in_flight = None;
    }

    /// Parses the banned-rules text. Derived fresh on every call; the text
    /// field is the single source of truth.
    pub fn banned_rules(&self) -> Vec<String> {
        rules::parse(&self.banned_text)
    }

    /// Switches the session to a new root path.
    ///
    /// The tag index and selection live only for one root-path session, so
    /// both are discarded, and the epoch bump makes any in-flight response
    /// stale. The abandoned task runs to completion and is then dropped;
    /// there is no cancellation primitive.
    pub fn reset_root(&mut self, root_path: String) {
        self.request_epoch += 1;
        self.root_path = root_path;
        self.counts = TagIndex::new();
        self.total_files = 0;
        self.selection = Selection::default();
        self.last_preview = None;
        self.last_apply = None;
        self.phase = WorkflowPhase::Idle;
        self.prior_phase = WorkflowPhase::Idle;
        self.status_message.clear();
        self.config.last_root = if self.root_path.is_empty() {
            None
        } else {
            Some(self.root_path.clone().into())
        };
    }

    /// Builds the scan request from the current inputs.
    pub fn scan_request(&self) -> ScanRequest {
        ScanRequest {
            root_path: self.root_path.clone(),
            min_count: self.min_count,
            banned_rules: self.banned_rules(),
            case_insensitive: self.case_insensitive,
        }
    }

    /// Builds the shared preview/apply request from the current inputs.
    pub fn mutation_request(&self) -> PreviewRequest {
        PreviewRequest {
            root_path: self.root_path.clone(),
            selected_to_remove: self.selection.to_payload(),
            banned_rules: self.banned_rules(),
            case_insensitive: self.case_insensitive,
            sort_lines: self.sort_lines,
        }
    }
}

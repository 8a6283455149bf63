//! Integration tests for the scan, select, preview, apply workflow.
//!
//! These drive the application layer through the same IPC dispatch a
//! frontend uses, with an MPSC-backed event proxy standing in for the
//! delivery channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use taglog_curator::app::events::{IpcMessage, UserEvent};
use taglog_curator::app::proxy::EventProxy;
use taglog_curator::app::state::{AppState, WorkflowPhase};
use taglog_curator::app::tasks::{LocalTagLogService, TagLogService};
use taglog_curator::app::view_model::UiState;
use taglog_curator::app;
use taglog_curator::config::AppConfig;
use taglog_curator::core::protocol::{
    ApplyRequest, ApplyResponse, PreviewRequest, PreviewResponse, ScanRequest, ScanResponse,
};
use taglog_curator::core::CoreError;

mod helpers {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[derive(Clone)]
    pub struct TestEventProxy {
        pub sender: mpsc::UnboundedSender<UserEvent>,
    }

    impl EventProxy for TestEventProxy {
        fn send_event(&self, event: UserEvent) {
            // A dropped receiver indicates a test setup error.
            if let Err(e) = self.sender.send(event) {
                panic!("Test receiver dropped: {}", e);
            }
        }
    }

    /// An isolated environment per test case: a temp directory of tag logs,
    /// fresh state, and a captured event stream.
    pub struct TestHarness<S: TagLogService> {
        pub state: Arc<Mutex<AppState>>,
        pub proxy: TestEventProxy,
        pub event_rx: mpsc::UnboundedReceiver<UserEvent>,
        pub service: Arc<S>,
        pub root_path: PathBuf,
        _temp_dir: TempDir,
    }

    impl TestHarness<LocalTagLogService> {
        pub fn new() -> Self {
            Self::with_service(LocalTagLogService)
        }
    }

    impl<S: TagLogService> TestHarness<S> {
        pub fn with_service(service: S) -> Self {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let root_path = temp_dir.path().to_path_buf();
            let (event_tx, event_rx) = mpsc::unbounded_channel();

            Self {
                state: Arc::new(Mutex::new(AppState::with_config(AppConfig::default()))),
                proxy: TestEventProxy { sender: event_tx },
                event_rx,
                service: Arc::new(service),
                root_path,
                _temp_dir: temp_dir,
            }
        }

        pub fn create_file(&self, path: &str, content: &str) {
            let file_path = self.root_path.join(path);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent dir");
            }
            fs::write(file_path, content).expect("Failed to write file");
        }

        pub fn read_file(&self, path: &str) -> String {
            fs::read_to_string(self.root_path.join(path)).expect("Failed to read file")
        }

        pub fn send(&self, command: &str, payload: serde_json::Value) {
            app::handle_ipc_message(
                IpcMessage {
                    command: command.to_string(),
                    payload,
                },
                &self.service,
                &self.proxy,
                &self.state,
            );
        }

        pub fn set_root(&self) {
            self.send(
                "setRootPath",
                json!({ "path": self.root_path.to_string_lossy() }),
            );
        }

        /// Discards events already queued by synchronous commands.
        pub fn drain(&mut self) {
            while self.event_rx.try_recv().is_ok() {}
        }

        /// Waits until the in-flight operation settles, returning the final
        /// state snapshot and any result events seen on the way.
        pub async fn wait_for_settled(&mut self) -> (UiState, Vec<UserEvent>) {
            let mut side_events = Vec::new();
            loop {
                match tokio::time::timeout(Duration::from_secs(10), self.event_rx.recv()).await {
                    Ok(Some(UserEvent::StateUpdate(ui_state))) => {
                        if !ui_state.is_busy {
                            return (*ui_state, side_events);
                        }
                    }
                    Ok(Some(event)) => side_events.push(event),
                    _ => panic!("Operation did not settle within timeout or channel closed"),
                }
            }
        }
    }
}

use helpers::TestHarness;

fn setup_tag_logs(harness: &TestHarness<LocalTagLogService>) {
    harness.create_file("a.txt", "water\nfire\nwater\n");
    harness.create_file("sub/b.txt", "water\nartist:alice\n");
    harness.create_file("notes.md", "water\n");
}

#[tokio::test]
async fn scan_select_preview_apply_happy_path() {
    let mut harness = TestHarness::new();
    setup_tag_logs(&harness);
    harness.set_root();
    harness.send("updateOptions", json!({ "min_count": 1 }));
    harness.drain();

    harness.send("scan", json!({}));
    let (ui, _) = harness.wait_for_settled().await;
    assert_eq!(ui.phase, WorkflowPhase::Scanned);
    assert_eq!(ui.total_files, 2);
    let general = ui
        .namespaces
        .iter()
        .find(|g| g.name == "general")
        .expect("general namespace missing");
    let water = general.tags.iter().find(|t| t.name == "water").unwrap();
    assert_eq!(water.count, 3);

    harness.send("toggleTag", json!({ "namespace": "general", "tag": "water" }));
    harness.drain();
    harness.send("preview", json!({}));
    let (ui, events) = harness.wait_for_settled().await;
    assert_eq!(ui.phase, WorkflowPhase::Previewed);
    let preview = events
        .iter()
        .find_map(|e| match e {
            UserEvent::ShowPreview(p) => Some(p),
            _ => None,
        })
        .expect("no ShowPreview event");
    assert_eq!(preview.files_modified, 2);
    assert_eq!(preview.tags_removed, 3);
    // Preview never touches the files.
    assert_eq!(harness.read_file("a.txt"), "water\nfire\nwater\n");

    harness.send("apply", json!({}));
    let (ui, events) = harness.wait_for_settled().await;
    assert_eq!(ui.phase, WorkflowPhase::Applied);
    let apply = events
        .iter()
        .find_map(|e| match e {
            UserEvent::ApplyComplete(a) => Some(a),
            _ => None,
        })
        .expect("no ApplyComplete event");
    assert_eq!(apply.files_modified, 2);
    assert_eq!(apply.tags_removed, 3);

    assert_eq!(harness.read_file("a.txt"), "fire\n");
    assert_eq!(harness.read_file("sub/b.txt"), "artist:alice\n");
    // Non-tag files are untouched.
    assert_eq!(harness.read_file("notes.md"), "water\n");

    let backup = std::path::PathBuf::from(&apply.backup_path);
    assert_eq!(
        std::fs::read_to_string(backup.join("a.txt")).unwrap(),
        "water\nfire\nwater\n"
    );
    assert_eq!(
        std::fs::read_to_string(backup.join("sub/b.txt")).unwrap(),
        "water\nartist:alice\n"
    );
    assert_eq!(ui.last_backup_path.as_deref(), Some(apply.backup_path.as_str()));
}

#[tokio::test]
async fn repeated_preview_reports_identical_results() {
    let mut harness = TestHarness::new();
    setup_tag_logs(&harness);
    harness.set_root();
    harness.send("updateOptions", json!({ "min_count": 1 }));
    harness.drain();
    harness.send("scan", json!({}));
    harness.wait_for_settled().await;
    harness.send("toggleTag", json!({ "namespace": "general", "tag": "water" }));
    harness.drain();

    harness.send("preview", json!({}));
    let (_, first_events) = harness.wait_for_settled().await;
    harness.send("preview", json!({}));
    let (ui, second_events) = harness.wait_for_settled().await;

    let first = first_events
        .iter()
        .find_map(|e| match e {
            UserEvent::ShowPreview(p) => Some(p),
            _ => None,
        })
        .unwrap();
    let second = second_events
        .iter()
        .find_map(|e| match e {
            UserEvent::ShowPreview(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(first.files_modified, second.files_modified);
    assert_eq!(first.tags_removed, second.tags_removed);
    assert_eq!(first.previews, second.previews);
    assert_eq!(ui.phase, WorkflowPhase::Previewed);
    assert_eq!(harness.read_file("a.txt"), "water\nfire\nwater\n");
}

#[tokio::test]
async fn failed_scan_keeps_the_last_good_index() {
    let mut harness = TestHarness::new();
    setup_tag_logs(&harness);
    harness.set_root();
    harness.send("updateOptions", json!({ "min_count": 1 }));
    harness.drain();
    harness.send("scan", json!({}));
    let (ui, _) = harness.wait_for_settled().await;
    assert_eq!(ui.phase, WorkflowPhase::Scanned);
    assert!(!ui.namespaces.is_empty());

    // Point at a path that no longer exists without resetting the session.
    harness.state.lock().unwrap().root_path = harness
        .root_path
        .join("vanished")
        .to_string_lossy()
        .into_owned();
    harness.send("scan", json!({}));
    let (ui, events) = harness.wait_for_settled().await;

    assert_eq!(ui.phase, WorkflowPhase::Scanned);
    assert!(ui.status_message.starts_with("Scan failed"));
    assert!(!ui.namespaces.is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, UserEvent::ShowError(_))));
}

/// Holds every operation until released, to keep one in flight on demand.
#[derive(Clone)]
struct GatedService {
    gate: Arc<Notify>,
    inner: LocalTagLogService,
}

#[async_trait]
impl TagLogService for GatedService {
    async fn scan(&self, request: ScanRequest) -> Result<ScanResponse, CoreError> {
        self.gate.notified().await;
        self.inner.scan(request).await
    }

    async fn preview(&self, request: PreviewRequest) -> Result<PreviewResponse, CoreError> {
        self.gate.notified().await;
        self.inner.preview(request).await
    }

    async fn apply(&self, request: ApplyRequest) -> Result<ApplyResponse, CoreError> {
        self.gate.notified().await;
        self.inner.apply(request).await
    }
}

#[tokio::test]
async fn second_trigger_is_ignored_while_busy() {
    let gate = Arc::new(Notify::new());
    let mut harness = TestHarness::with_service(GatedService {
        gate: gate.clone(),
        inner: LocalTagLogService,
    });
    harness.create_file("a.txt", "water\n");
    harness.set_root();
    harness.send("updateOptions", json!({ "min_count": 1 }));
    harness.drain();

    harness.send("scan", json!({}));
    // First trigger: one busy state update.
    match harness.event_rx.recv().await {
        Some(UserEvent::StateUpdate(ui)) => assert!(ui.is_busy),
        other => panic!("Expected busy StateUpdate, got {other:?}"),
    }

    // Second trigger while in flight produces no events at all.
    harness.send("scan", json!({}));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.event_rx.try_recv().is_err());

    gate.notify_one();
    let (ui, _) = harness.wait_for_settled().await;
    assert_eq!(ui.phase, WorkflowPhase::Scanned);
    assert_eq!(ui.total_files, 1);
}

#[tokio::test]
async fn root_change_discards_the_in_flight_response() {
    let gate = Arc::new(Notify::new());
    let mut harness = TestHarness::with_service(GatedService {
        gate: gate.clone(),
        inner: LocalTagLogService,
    });
    harness.create_file("old/a.txt", "water\nwater\n");
    harness.create_file("new/b.txt", "fire\n");
    harness.send(
        "setRootPath",
        json!({ "path": harness.root_path.join("old").to_string_lossy() }),
    );
    harness.send("updateOptions", json!({ "min_count": 1 }));
    harness.drain();
    harness.send("scan", json!({}));

    // Switch roots while the scan is still held at the gate.
    harness.send(
        "setRootPath",
        json!({ "path": harness.root_path.join("new").to_string_lossy() }),
    );
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The old root's response arrived with a stale epoch and was dropped.
    let state = harness.state.lock().unwrap();
    assert_eq!(state.phase, WorkflowPhase::Idle);
    assert!(state.counts.is_empty());
    assert_eq!(state.total_files, 0);
}

#[tokio::test]
async fn banned_rules_take_effect_without_selection() {
    let mut harness = TestHarness::new();
    harness.create_file("a.txt", "water\nmeta:2018\nMETA:2019\n");
    harness.set_root();
    harness.send("updateOptions", json!({ "min_count": 1, "case_insensitive": true }));
    harness.send("updateBannedText", json!({ "text": "meta:*\n" }));
    harness.drain();

    harness.send("scan", json!({}));
    let (ui, _) = harness.wait_for_settled().await;
    // Banned tags never show up in the index.
    assert_eq!(ui.namespaces.len(), 1);
    assert_eq!(ui.namespaces[0].name, "general");

    harness.send("preview", json!({}));
    let (_, events) = harness.wait_for_settled().await;
    let preview = events
        .iter()
        .find_map(|e| match e {
            UserEvent::ShowPreview(p) => Some(p),
            _ => None,
        })
        .unwrap();
    assert_eq!(preview.tags_removed, 2);
    assert_eq!(preview.previews[0].after, vec!["water"]);
}

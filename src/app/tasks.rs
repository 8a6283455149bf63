//! The asynchronous scan, preview, and apply tasks, plus the service seam
//! they call through.
//!
//! Each task follows the same shape: snapshot the request and the current
//! epoch under the lock, enter the in-flight phase, run the operation, then
//! re-lock and either commit the result or fall back to the prior stable
//! phase. A response whose captured epoch no longer matches the state is
//! stale (the session was reset while it was in flight) and is discarded
//! without touching anything.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::{AppState, WorkflowPhase};
use super::view_model::generate_ui_state;
use crate::core::protocol::{
    ApplyRequest, ApplyResponse, PreviewRequest, PreviewResponse, ScanRequest, ScanResponse,
};
use crate::core::{self, CoreError};

/// The boundary to the removal engine.
///
/// Production uses [`LocalTagLogService`]; tests substitute doubles to
/// simulate slow responses and failures.
#[async_trait]
pub trait TagLogService: Send + Sync + 'static {
    async fn scan(&self, request: ScanRequest) -> Result<ScanResponse, CoreError>;
    async fn preview(&self, request: PreviewRequest) -> Result<PreviewResponse, CoreError>;
    async fn apply(&self, request: ApplyRequest) -> Result<ApplyResponse, CoreError>;
}

/// Runs the engine in-process, off the async runtime's worker threads.
#[derive(Debug, Clone, Default)]
pub struct LocalTagLogService;

#[async_trait]
impl TagLogService for LocalTagLogService {
    async fn scan(&self, request: ScanRequest) -> Result<ScanResponse, CoreError> {
        tokio::task::spawn_blocking(move || core::scan_directory(&request)).await?
    }

    async fn preview(&self, request: PreviewRequest) -> Result<PreviewResponse, CoreError> {
        tokio::task::spawn_blocking(move || core::preview_changes(&request)).await?
    }

    async fn apply(&self, request: ApplyRequest) -> Result<ApplyResponse, CoreError> {
        tokio::task::spawn_blocking(move || core::apply_changes(&request)).await?
    }
}

enum PreparedRequest {
    Scan(ScanRequest),
    Mutation(PreviewRequest),
}

impl PreparedRequest {
    fn into_scan(self) -> ScanRequest {
        match self {
            PreparedRequest::Scan(request) => request,
            PreparedRequest::Mutation(_) => unreachable!("scan task received mutation request"),
        }
    }

    fn into_mutation(self) -> PreviewRequest {
        match self {
            PreparedRequest::Mutation(request) => request,
            PreparedRequest::Scan(_) => unreachable!("mutation task received scan request"),
        }
    }
}

/// Snapshots state for an operation and spawns its task.
///
/// Returns without doing anything if another operation is already in flight;
/// the single busy flag guards all three triggers.
fn start_operation<P, Fut>(
    phase: WorkflowPhase,
    proxy: P,
    state: Arc<Mutex<AppState>>,
    run: impl FnOnce(Arc<Mutex<AppState>>, P, PreparedRequest, u64) -> Fut,
) where
    P: EventProxy,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let mut guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");
    if guard.is_busy() {
        tracing::warn!(?phase, "Ignoring trigger while an operation is in flight");
        return;
    }
    let epoch = guard.request_epoch;
    guard.begin(phase);
    proxy.send_event(UserEvent::StateUpdate(Box::new(generate_ui_state(&guard))));

    let request = match phase {
        WorkflowPhase::Scanning => PreparedRequest::Scan(guard.scan_request()),
        _ => PreparedRequest::Mutation(guard.mutation_request()),
    };
    let handle = tokio::spawn(run(state.clone(), proxy, request, epoch));
    guard.in_flight = Some(handle);
}

/// Resolves a finished operation against the current state.
///
/// Locks, discards stale responses, and otherwise hands the state to the
/// commit closure (success) or reverts with a message (failure). A result
/// event (`ShowPreview`, `ApplyComplete`, `ShowError`) goes out first; the
/// `StateUpdate` always comes last, unless the response was stale.
fn settle<P: EventProxy, T>(
    state: &Arc<Mutex<AppState>>,
    proxy: &P,
    epoch: u64,
    success_phase: WorkflowPhase,
    result: Result<T, CoreError>,
    commit: impl FnOnce(&mut AppState, &T) -> String,
    result_event: impl FnOnce(&T) -> Option<UserEvent>,
    failure_prefix: &str,
) {
    let mut guard = state
        .lock()
        .expect("Mutex was poisoned. This should not happen.");
    if guard.request_epoch != epoch {
        tracing::warn!(
            stale = epoch,
            current = guard.request_epoch,
            "Discarding response from a superseded session"
        );
        return;
    }
    match result {
        Ok(value) => {
            let message = commit(&mut guard, &value);
            guard.complete(success_phase, message);
            if let Some(event) = result_event(&value) {
                proxy.send_event(event);
            }
        }
        Err(e) => {
            let message = format!("{failure_prefix}: {e}");
            guard.fail(message.clone());
            proxy.send_event(UserEvent::ShowError(message));
        }
    }
    proxy.send_event(UserEvent::StateUpdate(Box::new(generate_ui_state(&guard))));
}

/// Triggers a directory scan. On success the tag index is replaced
/// wholesale; on failure the previous index stays untouched.
pub fn start_scan<P: EventProxy, S: TagLogService>(
    service: Arc<S>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    start_operation(
        WorkflowPhase::Scanning,
        proxy,
        state,
        move |state, proxy, request, epoch| async move {
            let request = request.into_scan();
            tracing::info!(root = %request.root_path, "Starting scan");
            let result = service.scan(request).await.and_then(|response| {
                response.validate()?;
                Ok(response)
            });
            settle(
                &state,
                &proxy,
                epoch,
                WorkflowPhase::Scanned,
                result,
                |s, response: &ScanResponse| {
                    s.counts = response.counts.clone();
                    s.total_files = response.total_files;
                    format!("Scanned {} files", response.total_files)
                },
                |_| None,
                "Scan failed",
            );
        },
    );
}

/// Triggers a read-only removal preview.
pub fn start_preview<P: EventProxy, S: TagLogService>(
    service: Arc<S>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    start_operation(
        WorkflowPhase::Previewing,
        proxy,
        state,
        move |state, proxy, request, epoch| async move {
            let request = request.into_mutation();
            tracing::info!(root = %request.root_path, "Starting preview");
            let result = service.preview(request).await.and_then(|response| {
                response.validate()?;
                Ok(response)
            });
            settle(
                &state,
                &proxy,
                epoch,
                WorkflowPhase::Previewed,
                result,
                |s, response: &PreviewResponse| {
                    s.last_preview = Some(response.clone());
                    format!(
                        "{} files would change, {} tags removed",
                        response.files_modified, response.tags_removed
                    )
                },
                |response| Some(UserEvent::ShowPreview(response.clone())),
                "Preview failed",
            );
        },
    );
}

/// Triggers the destructive apply. The request shape is identical to
/// preview; the engine backs up every file before overwriting any.
pub fn start_apply<P: EventProxy, S: TagLogService>(
    service: Arc<S>,
    proxy: P,
    state: Arc<Mutex<AppState>>,
) {
    start_operation(
        WorkflowPhase::Applying,
        proxy,
        state,
        move |state, proxy, request, epoch| async move {
            let request = request.into_mutation();
            tracing::info!(root = %request.root_path, "Starting apply");
            let result = service.apply(request).await;
            settle(
                &state,
                &proxy,
                epoch,
                WorkflowPhase::Applied,
                result,
                |s, response: &ApplyResponse| {
                    s.last_apply = Some(response.clone());
                    format!(
                        "Updated {} files, removed {} tags. Backup: {}",
                        response.files_modified, response.tags_removed, response.backup_path
                    )
                },
                |response| Some(UserEvent::ApplyComplete(response.clone())),
                "Apply failed",
            );
        },
    );
}

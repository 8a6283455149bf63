//! The application layer: shared state, the workflow controller, and the
//! IPC surface a frontend drives it through.

pub mod commands;
pub mod events;
pub mod helpers;
pub mod proxy;
pub mod selection;
pub mod state;
pub mod tasks;
pub mod view_model;

use std::sync::{Arc, Mutex};

use events::{IpcMessage, UserEvent};
use proxy::EventProxy;
use state::AppState;
use tasks::TagLogService;

/// Dispatches one IPC message to its command handler.
///
/// Unknown commands are reported back rather than ignored, so a frontend
/// typo surfaces immediately.
pub fn handle_ipc_message<P: EventProxy, S: TagLogService>(
    message: IpcMessage,
    service: &Arc<S>,
    proxy: &P,
    state: &Arc<Mutex<AppState>>,
) {
    tracing::debug!(command = %message.command, "Handling IPC message");
    match message.command.as_str() {
        "initialize" => commands::initialize(proxy, state),
        "setRootPath" => commands::set_root_path(proxy, state, message.payload),
        "updateOptions" => commands::update_options(proxy, state, message.payload),
        "updateBannedText" => commands::update_banned_text(proxy, state, message.payload),
        "updateSearch" => commands::update_search(proxy, state, message.payload),
        "toggleTag" => commands::toggle_tag(proxy, state, message.payload),
        "clearSelection" => commands::clear_selection(proxy, state),
        "scan" => commands::scan(service.clone(), proxy, state),
        "preview" => commands::preview(service.clone(), proxy, state),
        "apply" => commands::apply(service.clone(), proxy, state),
        "exportBannedRules" => commands::export_banned_rules(proxy, state),
        "importBannedRules" => commands::import_banned_rules(proxy, state, message.payload),
        other => {
            tracing::warn!("Received unknown IPC command: {}", other);
            proxy.send_event(UserEvent::ShowError(format!("Unknown command: {other}")));
        }
    }
}

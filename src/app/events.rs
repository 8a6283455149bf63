//! Defines the event and message structures for communication between the
//! workflow backend and a frontend.

use serde::Deserialize;

use super::view_model::UiState;
use crate::core::protocol::{ApplyResponse, PreviewResponse};

/// Events sent from the workflow backend to the embedding surface (UI thread,
/// CLI driver, or test harness).
#[derive(Debug)]
pub enum UserEvent {
    /// A complete state update to re-render the UI.
    StateUpdate(Box<UiState>),
    /// A freshly computed removal preview for the diff panel.
    ShowPreview(PreviewResponse),
    /// A completed apply, including the backup location.
    ApplyComplete(ApplyResponse),
    /// Serialized banned rules ready for the frontend to persist as a
    /// download or file write.
    BannedRulesExported { filename: String, content: String },
    /// An error message to be displayed to the user.
    ShowError(String),
}

/// A message received from the embedding surface via the IPC channel.
#[derive(Deserialize, Debug)]
pub struct IpcMessage {
    /// The name of the command to execute.
    pub command: String,
    /// The payload associated with the command, as a JSON value.
    #[serde(default)]
    pub payload: serde_json::Value,
}

//! Defines the WebSocket message protocol between the browser shell and the API server.

use jarvis_core::{DialogueEvent, Mode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Free text typed by the user.
    Submit { text: String },
    /// Cancels whatever the agent is currently saying or generating.
    Interrupt,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once when the connection is ready.
    Connected { session_id: Uuid },
    /// The agent moved to a new mode.
    ModeChanged { mode: Mode },
    /// The currently revealed text and cursor blink phase.
    TextUpdate { text: String, cursor_visible: bool },
    /// Progress of the running long task, in `[0, 1]`.
    ProgressUpdate { progress: f32 },
    /// Whether the input box should be shown.
    InputEligibility { eligible: bool },
    /// Reports a protocol error to the client.
    Error { message: String },
}

impl From<DialogueEvent> for ServerMessage {
    fn from(event: DialogueEvent) -> Self {
        match event {
            DialogueEvent::ModeChanged { mode } => ServerMessage::ModeChanged { mode },
            DialogueEvent::TextUpdate {
                text,
                cursor_visible,
            } => ServerMessage::TextUpdate {
                text,
                cursor_visible,
            },
            DialogueEvent::ProgressUpdate { progress } => ServerMessage::ProgressUpdate { progress },
            DialogueEvent::InputEligibility { eligible } => {
                ServerMessage::InputEligibility { eligible }
            }
        }
    }
}

//! JARVIS Dialogue Engine
//!
//! The orchestration core behind the holographic assistant: it classifies
//! user input, reveals replies as a timed typewriter stream, runs the scripted
//! "code generation" task with its progress meter, and gates user input on the
//! session state. Rendering is left to whatever implements
//! [`presenter::Presenter`].

pub mod config;
pub mod error;
pub mod gate;
pub mod intent;
pub mod long_task;
pub mod presenter;
pub mod replies;
pub mod responder;
pub mod script;
pub mod session;
pub mod typewriter;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use config::{BusyPolicy, ConfigError, DialogueConfig};
pub use error::DialogueError;
pub use intent::{Intent, IntentClassifier, classify};
pub use presenter::{ChannelPresenter, DialogueEvent, Presenter};
pub use session::{DialogueSession, SessionSnapshot};

/// The single authoritative state of a dialogue session.
///
/// Owned by [`session::DialogueSession`]; every other component only
/// observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Speaking,
    Processing,
    Generating,
}

// Implement Display for easy conversion to a string, useful for logging and status lines.
impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::Speaking => write!(f, "speaking"),
            Mode::Processing => write!(f, "processing"),
            Mode::Generating => write!(f, "generating"),
        }
    }
}

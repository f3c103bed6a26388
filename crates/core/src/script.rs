//! Task scripts for the long-running "code generation" narrative.
//!
//! A script is authored as static data (or loaded from a JSON file at startup)
//! and never mutated while it runs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TaskStep {
    /// Reveal a line through the typewriter and wait for it to finish.
    Speak { text: String },
    /// Suspend for the given number of milliseconds.
    Wait { ms: u64 },
}

impl TaskStep {
    pub fn speak(text: impl Into<String>) -> Self {
        Self::Speak { text: text.into() }
    }

    pub fn wait(duration: Duration) -> Self {
        Self::Wait {
            ms: duration.as_millis() as u64,
        }
    }
}

/// An ordered, immutable sequence of steps plus an optional closing line.
///
/// The closing line is spoken after progress has been forced to completion,
/// so the observer sees 100% while it is revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskScript {
    pub steps: Vec<TaskStep>,
    #[serde(default)]
    pub completion: Option<String>,
}

impl TaskScript {
    pub fn new(steps: Vec<TaskStep>) -> Self {
        Self {
            steps,
            completion: None,
        }
    }

    pub fn with_completion(mut self, line: impl Into<String>) -> Self {
        self.completion = Some(line.into());
        self
    }

    /// Parses a script from its JSON representation.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// The built-in code generation narrative.
    pub fn code_generation() -> Self {
        Self::new(vec![
            TaskStep::speak(
                "Analyzing requirements... Identifying optimal architecture patterns.",
            ),
            TaskStep::wait(Duration::from_millis(500)),
            TaskStep::speak(
                "Initiating code generation sequence. Deploying holographic workspace.",
            ),
            TaskStep::wait(Duration::from_millis(500)),
            TaskStep::speak(
                "Generating modules... Creating React components... Implementing API integration...",
            ),
            TaskStep::wait(Duration::from_millis(6000)),
            TaskStep::speak("Building type definitions... Optimizing bundle structure..."),
            TaskStep::wait(Duration::from_millis(4000)),
        ])
        .with_completion(
            "Code generation complete. All modules compiled successfully. System ready for deployment.",
        )
    }
}

impl Default for TaskScript {
    fn default() -> Self {
        Self::code_generation()
    }
}

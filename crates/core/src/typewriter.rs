//! Typewriter Presenter
//!
//! Reveals a line one character per cadence tick, publishing the revealed
//! prefix on every tick, and then holds for a trailing pause before returning.

use crate::{error::DialogueError, presenter::Presenter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Suspends for `duration`, returning early with `Cancelled` if `cancel` fires.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), DialogueError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DialogueError::Cancelled),
        _ = time::sleep(duration) => Ok(()),
    }
}

/// Timing for a single reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    /// Time per revealed character.
    pub cadence: Duration,
    /// Hold after the last character before the reveal resolves.
    pub trailing_pause: Duration,
    /// Half-period of the cursor blink. Zero keeps the cursor always visible.
    pub cursor_blink: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            cadence: Duration::from_millis(25),
            trailing_pause: Duration::from_millis(300),
            cursor_blink: Duration::from_millis(500),
        }
    }
}

/// Mutable state of one in-flight reveal. Lives exactly as long as the reveal.
#[derive(Debug)]
struct RevealState {
    revealed_len: usize,
    cursor_visible: bool,
}

/// Reveals utterances character by character.
///
/// At most one reveal should be in flight at a time; the session guarantees
/// that. If a second reveal starts anyway, the first one's timer is cancelled
/// before the new one publishes anything.
pub struct Typewriter {
    presenter: Arc<dyn Presenter>,
    timing: RevealTiming,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl Typewriter {
    pub fn new(presenter: Arc<dyn Presenter>, timing: RevealTiming) -> Self {
        Self {
            presenter,
            timing,
            in_flight: Mutex::new(None),
        }
    }

    pub fn timing(&self) -> RevealTiming {
        self.timing
    }

    /// Reveals `text` and resolves once it is fully shown and the trailing
    /// pause has elapsed.
    pub async fn reveal(&self, text: &str, cancel: &CancellationToken) -> Result<(), DialogueError> {
        let token = cancel.child_token();
        if let Some(previous) = self.in_flight.lock().replace(token.clone()) {
            previous.cancel();
        }

        debug!(chars = text.chars().count(), "Revealing utterance");
        let result = self.run(text, &token).await;
        token.cancel();
        result
    }

    async fn run(&self, text: &str, cancel: &CancellationToken) -> Result<(), DialogueError> {
        // Byte offset at which each successive prefix ends.
        let prefix_ends: Vec<usize> = text
            .char_indices()
            .map(|(idx, ch)| idx + ch.len_utf8())
            .collect();

        let started = Instant::now();
        let mut state = RevealState {
            revealed_len: 0,
            cursor_visible: true,
        };
        self.presenter.on_text_update("", state.cursor_visible);

        while state.revealed_len < prefix_ends.len() {
            pause(self.timing.cadence, cancel).await?;
            state.revealed_len += 1;
            state.cursor_visible = self.cursor_phase(started.elapsed());
            let end = prefix_ends[state.revealed_len - 1];
            self.presenter
                .on_text_update(&text[..end], state.cursor_visible);
        }

        pause(self.timing.trailing_pause, cancel).await
    }

    fn cursor_phase(&self, elapsed: Duration) -> bool {
        let blink = self.timing.cursor_blink.as_millis();
        if blink == 0 {
            return true;
        }
        (elapsed.as_millis() / blink) % 2 == 0
    }
}

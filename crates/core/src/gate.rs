//! Input Gate
//!
//! Derives whether free-text entry is available from the session state.
//! Raising the ready signal is debounced; dropping it is immediate.

use crate::{Mode, presenter::Presenter};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::trace;

/// Input is eligible only after the greeting and only while idle.
pub fn is_eligible(has_greeted: bool, mode: Mode) -> bool {
    has_greeted && mode == Mode::Idle
}

#[derive(Default)]
struct GateState {
    eligible: bool,
    ready: bool,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

pub struct InputGate {
    presenter: Arc<dyn Presenter>,
    debounce: Duration,
    state: Arc<Mutex<GateState>>,
}

impl InputGate {
    pub fn new(presenter: Arc<dyn Presenter>, debounce: Duration) -> Self {
        Self {
            presenter,
            debounce,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    /// Whether the externally visible ready signal is currently raised.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Recomputes the gate from the latest session state.
    ///
    /// Must be called from within a tokio runtime; the debounce runs as a
    /// short-lived task that is aborted if eligibility is lost first.
    pub fn update(&self, has_greeted: bool, mode: Mode) {
        let eligible = is_eligible(has_greeted, mode);
        let mut state = self.state.lock();
        if state.eligible == eligible {
            return;
        }
        state.eligible = eligible;
        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }

        if eligible {
            trace!(debounce_ms = self.debounce.as_millis() as u64, "Input eligible; debouncing");
            let generation = state.generation;
            let shared = self.state.clone();
            let presenter = self.presenter.clone();
            let debounce = self.debounce;
            state.pending = Some(tokio::spawn(async move {
                time::sleep(debounce).await;
                let mut state = shared.lock();
                if state.generation != generation || !state.eligible {
                    return;
                }
                state.pending = None;
                if !state.ready {
                    state.ready = true;
                    presenter.on_input_eligibility_change(true);
                }
            }));
        } else if state.ready {
            state.ready = false;
            self.presenter.on_input_eligibility_change(false);
        }
    }
}

impl Drop for InputGate {
    fn drop(&mut self) {
        if let Some(pending) = self.state.lock().pending.take() {
            pending.abort();
        }
    }
}

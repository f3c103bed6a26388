//! Long-Task Simulator
//!
//! Plays a [`TaskScript`] step by step while a progress meter advances on its
//! own fixed tick. The two activities share one task: the meter is an
//! interval polled alongside the step sequence, so it stops the instant the
//! sequence resolves and cannot outlive the call.

use crate::{
    error::DialogueError,
    presenter::Presenter,
    script::{TaskScript, TaskStep},
    typewriter::{Typewriter, pause},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cadence of the progress meter and the hold after completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTiming {
    pub tick: Duration,
    /// Added on every tick. Deliberately approximate; completion is forced.
    pub increment: f32,
    /// Hold after progress reaches 1.0 so an observer can register it.
    pub settle: Duration,
}

impl Default for ProgressTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            increment: 0.008,
            settle: Duration::from_millis(1000),
        }
    }
}

pub struct LongTaskSimulator {
    presenter: Arc<dyn Presenter>,
    typewriter: Arc<Typewriter>,
    timing: ProgressTiming,
    progress: watch::Sender<f32>,
}

impl LongTaskSimulator {
    pub fn new(
        presenter: Arc<dyn Presenter>,
        typewriter: Arc<Typewriter>,
        timing: ProgressTiming,
    ) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            presenter,
            typewriter,
            timing,
            progress,
        }
    }

    /// The current progress value in `[0.0, 1.0]`.
    pub fn progress(&self) -> f32 {
        *self.progress.borrow()
    }

    /// A receiver that observes every progress change.
    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.progress.subscribe()
    }

    /// Runs `script` to completion.
    ///
    /// Progress restarts at 0.0, advances on every tick while the steps run,
    /// and is forced to exactly 1.0 once the last step resolves. The optional
    /// completion line is then spoken and the call holds for the settle pause.
    pub async fn run(
        &self,
        script: &TaskScript,
        cancel: &CancellationToken,
    ) -> Result<(), DialogueError> {
        info!(steps = script.steps.len(), "Starting long task");
        self.set_progress(0.0);

        let tick = self.timing.tick.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let steps = self.run_steps(script, cancel);
        tokio::pin!(steps);

        let result = loop {
            tokio::select! {
                result = &mut steps => break result,
                _ = ticker.tick() => self.advance(),
            }
        };
        drop(ticker);
        result?;

        self.set_progress(1.0);
        debug!("Long task steps finished; progress forced to completion");

        if let Some(line) = &script.completion {
            self.typewriter.reveal(line, cancel).await?;
        }
        pause(self.timing.settle, cancel).await?;
        info!("Long task complete");
        Ok(())
    }

    async fn run_steps(
        &self,
        script: &TaskScript,
        cancel: &CancellationToken,
    ) -> Result<(), DialogueError> {
        for step in &script.steps {
            match step {
                TaskStep::Speak { text } => self.typewriter.reveal(text, cancel).await?,
                TaskStep::Wait { ms } => pause(Duration::from_millis(*ms), cancel).await?,
            }
        }
        Ok(())
    }

    fn advance(&self) {
        let increment = self.timing.increment;
        let advanced = self.progress.send_if_modified(|p| {
            if *p >= 1.0 {
                return false;
            }
            *p = (*p + increment).min(1.0);
            true
        });
        if advanced {
            self.presenter.on_progress_update(self.progress());
        }
    }

    fn set_progress(&self, value: f32) {
        self.progress.send_replace(value);
        self.presenter.on_progress_update(value);
    }
}

//! Terminal rendering of a dialogue session.
//!
//! The whole view is one status line that is redrawn in place on every
//! update. When a new reveal starts, the previous line is committed so the
//! conversation scrolls like a transcript.

use jarvis_core::{Mode, Presenter};
use parking_lot::Mutex;
use std::io::Write;

const CLEAR_LINE: &str = "\r\x1b[2K";
const CURSOR: char = '▌';
const BAR_WIDTH: usize = 20;

#[derive(Debug, Default)]
struct ViewState {
    mode: Mode,
    text: String,
    cursor_visible: bool,
    progress: Option<f32>,
}

/// Draws the status line for the current view.
fn render_line(view: &ViewState) -> String {
    let mut line = String::from("JARVIS> ");
    if view.mode == Mode::Generating {
        if let Some(progress) = view.progress {
            line.push_str(&progress_bar(progress));
            line.push(' ');
        }
    }
    line.push_str(&view.text);
    if view.cursor_visible {
        line.push(CURSOR);
    }
    line
}

fn progress_bar(progress: f32) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * BAR_WIDTH as f32).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        (progress * 100.0).round() as u32
    )
}

/// A [`Presenter`] that writes to a terminal-like sink.
pub struct TerminalPresenter<W: Write + Send> {
    out: Mutex<(W, ViewState)>,
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new((out, ViewState::default())),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().0
    }

    fn redraw(out: &mut W, view: &ViewState) {
        let result = write!(out, "{}{}", CLEAR_LINE, render_line(view)).and_then(|_| out.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "Failed to draw status line");
        }
    }

    fn commit(out: &mut W) {
        if let Err(e) = writeln!(out) {
            tracing::debug!(error = %e, "Failed to write newline");
        }
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn on_mode_change(&self, mode: Mode) {
        let mut guard = self.out.lock();
        let (out, view) = &mut *guard;
        view.mode = mode;
        if mode == Mode::Idle && !view.text.is_empty() {
            view.cursor_visible = false;
            Self::redraw(out, view);
            Self::commit(out);
            view.text.clear();
            view.progress = None;
        }
    }

    fn on_text_update(&self, revealed_text: &str, cursor_visible: bool) {
        let mut guard = self.out.lock();
        let (out, view) = &mut *guard;
        if revealed_text.is_empty() && !view.text.is_empty() {
            view.cursor_visible = false;
            Self::redraw(out, view);
            Self::commit(out);
        }
        view.text.clear();
        view.text.push_str(revealed_text);
        view.cursor_visible = cursor_visible;
        Self::redraw(out, view);
    }

    fn on_progress_update(&self, progress: f32) {
        let mut guard = self.out.lock();
        let (out, view) = &mut *guard;
        view.progress = Some(progress);
        Self::redraw(out, view);
    }

    fn on_input_eligibility_change(&self, eligible: bool) {
        if eligible {
            let mut guard = self.out.lock();
            let (out, _) = &mut *guard;
            let result = write!(out, "> ").and_then(|_| out.flush());
            if let Err(e) = result {
                tracing::debug!(error = %e, "Failed to draw prompt");
            }
        }
    }
}

//! Presentation Boundary
//!
//! The engine never talks to a renderer directly. Everything a view needs is
//! pushed through the [`Presenter`] trait as immutable snapshots: mode changes,
//! the currently revealed text, task progress and input eligibility. A view
//! that only listens to these callbacks stays consistent with the engine.

use crate::Mode;
use serde::Serialize;
use tokio::sync::mpsc;

/// Receives every observable change made by the engine.
///
/// Implementations must not block: callbacks are invoked from inside timed
/// reveals and progress ticks.
pub trait Presenter: Send + Sync {
    fn on_mode_change(&self, mode: Mode);
    fn on_text_update(&self, revealed_text: &str, cursor_visible: bool);
    fn on_progress_update(&self, progress: f32);
    fn on_input_eligibility_change(&self, eligible: bool);
}

/// A published presentation event, as carried over a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueEvent {
    ModeChanged { mode: Mode },
    TextUpdate { text: String, cursor_visible: bool },
    ProgressUpdate { progress: f32 },
    InputEligibility { eligible: bool },
}

/// A [`Presenter`] that forwards every callback into an unbounded channel.
///
/// This is how detached views (a WebSocket, a terminal loop, a test) observe
/// a session. Events published after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<DialogueEvent>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DialogueEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn publish(&self, event: DialogueEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Dropping presentation event: receiver closed.");
        }
    }
}

impl Presenter for ChannelPresenter {
    fn on_mode_change(&self, mode: Mode) {
        self.publish(DialogueEvent::ModeChanged { mode });
    }

    fn on_text_update(&self, revealed_text: &str, cursor_visible: bool) {
        self.publish(DialogueEvent::TextUpdate {
            text: revealed_text.to_string(),
            cursor_visible,
        });
    }

    fn on_progress_update(&self, progress: f32) {
        self.publish(DialogueEvent::ProgressUpdate { progress });
    }

    fn on_input_eligibility_change(&self, eligible: bool) {
        self.publish(DialogueEvent::InputEligibility { eligible });
    }
}

/// Drains everything currently queued on `rx` without waiting.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<DialogueEvent>) -> Vec<DialogueEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_presenter_forwards_in_order() {
        let (presenter, mut rx) = ChannelPresenter::new();
        presenter.on_mode_change(Mode::Speaking);
        presenter.on_text_update("Go", true);
        presenter.on_progress_update(0.5);
        presenter.on_input_eligibility_change(false);

        assert_eq!(
            drain(&mut rx),
            vec![
                DialogueEvent::ModeChanged {
                    mode: Mode::Speaking
                },
                DialogueEvent::TextUpdate {
                    text: "Go".into(),
                    cursor_visible: true
                },
                DialogueEvent::ProgressUpdate { progress: 0.5 },
                DialogueEvent::InputEligibility { eligible: false },
            ]
        );
    }

    #[test]
    fn test_publishing_after_receiver_dropped_is_harmless() {
        let (presenter, rx) = ChannelPresenter::new();
        drop(rx);
        presenter.on_mode_change(Mode::Idle);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&DialogueEvent::ModeChanged {
            mode: Mode::Generating,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"mode_changed","mode":"generating"}"#);
    }
}

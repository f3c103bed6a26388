//! Session State Machine
//!
//! [`DialogueSession`] owns the current [`Mode`] and is the only component
//! that changes it. It serializes access to the typewriter and the long-task
//! simulator: a turn starts only by moving `Idle -> Processing` (or
//! `Idle -> Speaking` for the greeting) in a single atomic check-and-set, and
//! every turn ends by forcing the machine back to `Idle`.
//!
//! Mode flow:
//!
//! ```text
//! greet:        Idle -> Speaking -> Idle
//! conversation: Idle -> Processing -> Speaking -> Idle
//! code request: Idle -> Processing -> Speaking -> Processing -> Generating -> Idle
//! ```

use crate::{
    Mode,
    config::{BusyPolicy, DialogueConfig},
    error::DialogueError,
    gate::InputGate,
    intent::Intent,
    long_task::LongTaskSimulator,
    presenter::Presenter,
    responder::Responder,
    typewriter::{Typewriter, pause},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// An immutable view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub has_greeted: bool,
}

pub struct DialogueSession {
    config: DialogueConfig,
    presenter: Arc<dyn Presenter>,
    responder: Option<Arc<dyn Responder>>,
    typewriter: Arc<Typewriter>,
    long_task: LongTaskSimulator,
    gate: InputGate,
    state: watch::Sender<SessionSnapshot>,
    /// Cancellation handle of the current (or most recent) turn.
    turn: Mutex<CancellationToken>,
}

impl DialogueSession {
    pub fn new(config: DialogueConfig, presenter: Arc<dyn Presenter>) -> Self {
        let typewriter = Arc::new(Typewriter::new(presenter.clone(), config.reveal));
        let long_task =
            LongTaskSimulator::new(presenter.clone(), typewriter.clone(), config.progress);
        let gate = InputGate::new(presenter.clone(), config.gate_debounce);
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            config,
            presenter,
            responder: None,
            typewriter,
            long_task,
            gate,
            state,
            turn: Mutex::new(CancellationToken::new()),
        }
    }

    /// Wires in a live responder used in place of the fixed reply templates.
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        *self.state.borrow()
    }

    pub fn mode(&self) -> Mode {
        self.snapshot().mode
    }

    pub fn has_greeted(&self) -> bool {
        self.snapshot().has_greeted
    }

    /// Whether the debounced input-ready signal is raised.
    pub fn input_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Progress of the current or most recent long task.
    pub fn progress(&self) -> f32 {
        self.long_task.progress()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.long_task.subscribe()
    }

    /// Delivers the opening greeting.
    ///
    /// Only allowed once. If a turn is already running the greeting waits
    /// for `Idle` and then starts. Completing (or interrupting) the greeting
    /// latches `has_greeted`, which is what first makes input eligible.
    pub async fn greet(&self) -> Result<(), DialogueError> {
        let cancel = loop {
            if let Some(cancel) = self.try_begin(Mode::Speaking, |s| !s.has_greeted) {
                break cancel;
            }
            if self.has_greeted() {
                debug!("Ignoring repeated greeting");
                return Err(DialogueError::AlreadyGreeted);
            }
            debug!(mode = ?self.mode(), "Greeting waits for the current turn");
            let mut rx = self.state.subscribe();
            if rx
                .wait_for(|s| s.mode == Mode::Idle || s.has_greeted)
                .await
                .is_err()
            {
                return Err(DialogueError::Busy);
            }
        };

        info!("Delivering greeting");
        let greeting = self.config.replies.greeting.clone();
        if let Err(e) = self.typewriter.reveal(&greeting, &cancel).await {
            warn!(error = %e, "Greeting cut short");
        }
        self.finish_turn(&cancel, true);
        Ok(())
    }

    /// Submits user text.
    ///
    /// Rejected with no side effects when the trimmed text is empty
    /// (`InvalidInput`) or when a turn is already running and the busy policy
    /// is `Drop` (`Busy`). Once accepted the turn runs to completion and
    /// always leaves the machine in `Idle`; failures inside the turn are
    /// logged, never returned.
    pub async fn submit(&self, text: &str) -> Result<(), DialogueError> {
        let input = text.trim();
        if input.is_empty() {
            debug!("Ignoring empty submission");
            return Err(DialogueError::InvalidInput);
        }

        let cancel = match self.try_begin(Mode::Processing, |_| true) {
            Some(cancel) => cancel,
            None => self.acquire_when_busy().await?,
        };

        let intent = self.config.classifier.classify(input);
        let span = info_span!("turn", ?intent);
        let result = self
            .run_turn(intent, input, &cancel)
            .instrument(span)
            .await;

        match result {
            Ok(()) => {}
            Err(DialogueError::Cancelled) => warn!(?intent, "Turn cancelled; resetting to idle"),
            Err(e) => error!(?intent, error = %e, "Turn failed; forcing reset to idle"),
        }
        self.finish_turn(&cancel, false);
        Ok(())
    }

    /// Latches `has_greeted` without speaking, for hosts that start without
    /// a greeting.
    pub fn skip_greeting(&self) {
        let latched = self.state.send_if_modified(|s| {
            if s.has_greeted {
                return false;
            }
            s.has_greeted = true;
            true
        });
        if latched {
            info!("Greeting skipped");
            let snapshot = self.snapshot();
            self.gate.update(snapshot.has_greeted, snapshot.mode);
        }
    }

    /// Cancels the running turn, if any. Every pending timer of that turn is
    /// released and the machine returns to `Idle`.
    pub fn interrupt(&self) {
        let turn = self.turn.lock();
        if !turn.is_cancelled() && self.mode() != Mode::Idle {
            info!("Interrupting current turn");
        }
        turn.cancel();
    }

    async fn acquire_when_busy(&self) -> Result<CancellationToken, DialogueError> {
        match self.config.busy_policy {
            BusyPolicy::Drop => {
                debug!(mode = ?self.mode(), "Session busy; dropping submission");
                Err(DialogueError::Busy)
            }
            BusyPolicy::Interrupt => {
                self.interrupt();
                let mut rx = self.state.subscribe();
                if rx.wait_for(|s| s.mode == Mode::Idle).await.is_err() {
                    return Err(DialogueError::Busy);
                }
                self.try_begin(Mode::Processing, |_| true)
                    .ok_or(DialogueError::Busy)
            }
        }
    }

    async fn run_turn(
        &self,
        intent: Intent,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<(), DialogueError> {
        match intent {
            Intent::CodeRequest => {
                let acknowledgment = self.config.replies.acknowledge(input);
                self.transition(Mode::Speaking);
                self.typewriter.reveal(&acknowledgment, cancel).await?;
                self.transition(Mode::Processing);

                pause(self.config.ack_pause, cancel).await?;

                self.transition(Mode::Generating);
                self.long_task.run(&self.config.script, cancel).await
            }
            _ => {
                let reply = self.compose_reply(intent, input, cancel).await?;
                self.transition(Mode::Speaking);
                self.typewriter.reveal(&reply, cancel).await
            }
        }
    }

    async fn compose_reply(
        &self,
        intent: Intent,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<String, DialogueError> {
        let Some(responder) = &self.responder else {
            return Ok(self.config.replies.for_intent(intent, input));
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DialogueError::Cancelled),
            fetched = responder.fetch_response(input) => fetched,
        };
        match fetched {
            Ok(reply) => Ok(reply),
            Err(e) => {
                let failure = DialogueError::ResponderFailure(format!("{e:#}"));
                warn!(error = %failure, "Using fallback line");
                Ok(self.config.replies.fallback.clone())
            }
        }
    }

    /// Atomically enters `to` from `Idle` when `allow` accepts the current
    /// state, and hands out a fresh cancellation token for the new turn.
    fn try_begin(
        &self,
        to: Mode,
        allow: impl Fn(&SessionSnapshot) -> bool,
    ) -> Option<CancellationToken> {
        let mut turn = self.turn.lock();
        let entered = self.state.send_if_modified(|s| {
            if s.mode == Mode::Idle && allow(s) {
                s.mode = to;
                true
            } else {
                false
            }
        });
        if !entered {
            return None;
        }

        let token = CancellationToken::new();
        std::mem::replace(&mut *turn, token.clone()).cancel();
        drop(turn);

        self.publish_transition(Mode::Idle, to);
        Some(token)
    }

    fn transition(&self, to: Mode) {
        let mut from = to;
        let changed = self.state.send_if_modified(|s| {
            from = s.mode;
            if s.mode == to {
                return false;
            }
            s.mode = to;
            true
        });
        if changed {
            self.publish_transition(from, to);
        }
    }

    /// Releases the turn's timers and forces the machine back to `Idle`,
    /// optionally latching the greeting.
    fn finish_turn(&self, cancel: &CancellationToken, greeted: bool) {
        cancel.cancel();
        let mut from = Mode::Idle;
        self.state.send_modify(|s| {
            from = s.mode;
            s.mode = Mode::Idle;
            s.has_greeted |= greeted;
        });

        if from != Mode::Idle {
            self.publish_transition(from, Mode::Idle);
        } else {
            let snapshot = self.snapshot();
            self.gate.update(snapshot.has_greeted, snapshot.mode);
        }
    }

    fn publish_transition(&self, from: Mode, to: Mode) {
        debug!(?from, ?to, "Mode transition");
        self.presenter.on_mode_change(to);
        let snapshot = self.snapshot();
        self.gate.update(snapshot.has_greeted, snapshot.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::{ChannelPresenter, DialogueEvent, drain};
    use crate::responder::MockResponder;
    use crate::script::{TaskScript, TaskStep};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time;

    fn quick_config() -> DialogueConfig {
        DialogueConfig {
            script: TaskScript::new(vec![
                TaskStep::speak("Working."),
                TaskStep::wait(Duration::from_millis(300)),
            ])
            .with_completion("Done."),
            ..DialogueConfig::default()
        }
    }

    fn session(config: DialogueConfig) -> (Arc<DialogueSession>, UnboundedReceiver<DialogueEvent>) {
        let (presenter, rx) = ChannelPresenter::new();
        (Arc::new(DialogueSession::new(config, Arc::new(presenter))), rx)
    }

    fn modes(events: &[DialogueEvent]) -> Vec<Mode> {
        events
            .iter()
            .filter_map(|e| match e {
                DialogueEvent::ModeChanged { mode } => Some(*mode),
                _ => None,
            })
            .collect()
    }

    fn last_text(events: &[DialogueEvent]) -> Option<String> {
        events.iter().rev().find_map(|e| match e {
            DialogueEvent::TextUpdate { text, .. } => Some(text.clone()),
            _ => None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_greet_latches_flag() {
        let (session, mut rx) = session(quick_config());
        assert!(!session.has_greeted());

        session.greet().await.unwrap();
        assert!(session.has_greeted());
        assert_eq!(session.mode(), Mode::Idle);

        let events = drain(&mut rx);
        assert_eq!(modes(&events), vec![Mode::Speaking, Mode::Idle]);
        assert_eq!(last_text(&events).unwrap(), session.config().replies.greeting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_greet_only_once() {
        let (session, mut rx) = session(quick_config());
        session.greet().await.unwrap();
        drain(&mut rx);

        assert_eq!(session.greet().await, Err(DialogueError::AlreadyGreeted));
        assert!(modes(&drain(&mut rx)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_waits_for_early_submission() {
        let (session, mut rx) = session(quick_config());
        let greeter = {
            let session = session.clone();
            tokio::spawn(async move {
                time::sleep(session.config().greeting_delay).await;
                session.greet().await
            })
        };

        session.submit("status").await.unwrap();
        assert_eq!(greeter.await.unwrap(), Ok(()));
        assert!(session.has_greeted());

        time::sleep(session.config().gate_debounce + Duration::from_millis(1)).await;
        assert!(session.input_ready());

        let events = drain(&mut rx);
        assert_eq!(
            modes(&events),
            vec![
                Mode::Processing,
                Mode::Speaking,
                Mode::Idle,
                Mode::Speaking,
                Mode::Idle
            ]
        );
        assert_eq!(last_text(&events).unwrap(), session.config().replies.greeting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_greeting_opens_the_gate() {
        let (session, mut rx) = session(quick_config());
        session.skip_greeting();
        assert!(session.has_greeted());

        time::sleep(session.config().gate_debounce + Duration::from_millis(1)).await;
        assert!(session.input_ready());
        assert_eq!(
            drain(&mut rx),
            vec![DialogueEvent::InputEligibility { eligible: true }]
        );
        assert_eq!(session.greet().await, Err(DialogueError::AlreadyGreeted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_submission_has_no_effect() {
        let (session, mut rx) = session(quick_config());
        session.greet().await.unwrap();
        time::sleep(Duration::from_secs(1)).await;
        drain(&mut rx);

        assert_eq!(session.submit("").await, Err(DialogueError::InvalidInput));
        assert_eq!(session.submit("  \t\n ").await, Err(DialogueError::InvalidInput));
        time::sleep(Duration::from_secs(1)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversational_turn() {
        let (session, mut rx) = session(quick_config());
        session.greet().await.unwrap();
        drain(&mut rx);

        session.submit("status please").await.unwrap();
        let events = drain(&mut rx);
        assert_eq!(
            modes(&events),
            vec![Mode::Processing, Mode::Speaking, Mode::Idle]
        );
        assert_eq!(last_text(&events).unwrap(), session.config().replies.status);
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_request_never_passes_through_idle() {
        let (session, mut rx) = session(quick_config());
        session.submit("write a parser").await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            modes(&events),
            vec![
                Mode::Processing,
                Mode::Speaking,
                Mode::Processing,
                Mode::Generating,
                Mode::Idle
            ]
        );
        assert_eq!(last_text(&events).unwrap(), "Done.");
        assert_eq!(session.progress(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_submission_is_dropped() {
        let (session, mut rx) = session(quick_config());
        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("hello").await })
        };
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.mode(), Mode::Speaking);

        assert_eq!(session.submit("thank you").await, Err(DialogueError::Busy));
        first.await.unwrap().unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            modes(&events),
            vec![Mode::Processing, Mode::Speaking, Mode::Idle]
        );
        assert!(events.iter().all(|e| match e {
            DialogueEvent::TextUpdate { text, .. } => !text.starts_with("You're"),
            _ => true,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_policy_replaces_stale_turn() {
        let config = DialogueConfig {
            busy_policy: BusyPolicy::Interrupt,
            ..quick_config()
        };
        let (session, mut rx) = session(config);
        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("build a rocket").await })
        };
        time::sleep(Duration::from_millis(100)).await;

        session.submit("thanks").await.unwrap();
        first.await.unwrap().unwrap();

        let events = drain(&mut rx);
        assert!(!modes(&events).contains(&Mode::Generating));
        assert_eq!(last_text(&events).unwrap(), session.config().replies.thanks);
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_resets_to_idle_and_stops_timers() {
        let (session, mut rx) = session(quick_config());
        let turn = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("generate the app").await })
        };
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(session.mode(), Mode::Generating);

        session.interrupt();
        turn.await.unwrap().unwrap();
        assert_eq!(session.mode(), Mode::Idle);

        drain(&mut rx);
        time::sleep(Duration::from_secs(5)).await;
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_responder_replaces_templates() {
        let mut responder = MockResponder::new();
        responder
            .expect_fetch_response()
            .withf(|text| text == "What is the weather?")
            .times(1)
            .returning(|_| Ok("Overcast, sir.".to_string()));

        let (presenter, mut rx) = ChannelPresenter::new();
        let session = DialogueSession::new(quick_config(), Arc::new(presenter))
            .with_responder(Arc::new(responder));

        session.submit("  What is the weather?  ").await.unwrap();
        assert_eq!(last_text(&drain(&mut rx)).unwrap(), "Overcast, sir.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_responder_failure_uses_fallback() {
        let mut responder = MockResponder::new();
        responder
            .expect_fetch_response()
            .returning(|_| Err(anyhow::anyhow!("401 Unauthorized")));

        let (presenter, mut rx) = ChannelPresenter::new();
        let session = DialogueSession::new(quick_config(), Arc::new(presenter))
            .with_responder(Arc::new(responder));

        assert_eq!(session.submit("hi").await, Ok(()));
        let events = drain(&mut rx);
        assert_eq!(
            last_text(&events).unwrap(),
            session.config().replies.fallback
        );
        assert_eq!(modes(&events).last(), Some(&Mode::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_requests_skip_responder() {
        let mut responder = MockResponder::new();
        responder.expect_fetch_response().never();

        let (presenter, _rx) = ChannelPresenter::new();
        let session = DialogueSession::new(quick_config(), Arc::new(presenter))
            .with_responder(Arc::new(responder));
        session.submit("make it so").await.unwrap();
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_final_state() {
        let (session, _rx) = session(quick_config());
        let mut rx = session.subscribe();
        session.greet().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            SessionSnapshot {
                mode: Mode::Idle,
                has_greeted: true
            }
        );
    }
}

//! Error taxonomy for the dialogue engine.

/// Errors surfaced by the dialogue engine.
///
/// Only `InvalidInput` and `Busy` ever reach the caller of
/// [`DialogueSession::submit`](crate::session::DialogueSession::submit), and both
/// mean the submission was dropped without touching any state. `greet` may
/// additionally report `AlreadyGreeted`. The remaining
/// variants are handled inside a turn: a responder failure is replaced by the
/// fallback line, and a cancelled turn forces the machine back to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DialogueError {
    #[error("Submission is empty after trimming whitespace")]
    InvalidInput,
    #[error("Session is busy")]
    Busy,
    #[error("Greeting has already been delivered")]
    AlreadyGreeted,
    #[error("Text provider failed: {0}")]
    ResponderFailure(String),
    #[error("Turn was cancelled")]
    Cancelled,
}

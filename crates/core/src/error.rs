use std::time::Duration;

use thiserror::Error;

use crate::types::RunState;

/// Failures surfaced by the core. Everything here is recoverable: the
/// operator (or a recipe) decides whether to retry.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no window title contains \"{title}\"")]
    WindowNotFound { title: String },

    #[error("window found, but the game is not visible (signature color missing)")]
    SignatureNotFound,

    #[error("worker is busy, could not pause (last activity {idle_for:?} ago)")]
    PauseTimeout { idle_for: Duration },

    #[error("worker did not exit within {waited:?}")]
    StopTimeout { waited: Duration },

    #[error("worker thread is no longer running")]
    WorkerGone,

    #[error("cannot {op} while {state}")]
    InvalidTransition { op: &'static str, state: RunState },

    #[error("run was stopped")]
    Cancelled,

    #[error("coordinates out of range: {0}")]
    OutOfRange(String),

    #[error("platform: {0}")]
    Platform(String),

    #[error("recipe: {0}")]
    Recipe(String),
}

pub type Result<T, E = RunError> = std::result::Result<T, E>;

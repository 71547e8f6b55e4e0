use std::sync::mpsc::RecvError;

use thiserror::Error;

use crate::lifecycle::Stage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    #[error("Operation not allowed on the main thread: {0}")]
    MainThread(String),

    #[error("Operation only supported from the main thread: {0}")]
    NonMainThread(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error(
        "Activity never becomes requested state \"{expected}\" (last lifecycle transition = \"{last_stage}\")"
    )]
    StateTimeout { expected: String, last_stage: Stage },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    AssertionFailed(String),

    #[error("Unable to resolve activity for: {0}")]
    Unresolved(String),

    #[error("Task panicked on the main thread: {0}")]
    MainThreadPanic(String),
}

pub type Result<T> = std::result::Result<T, TestError>;

// The main-thread marshalling machinery has its own failure modes that we
// don't want to leak through the public API, so they get folded into
// `TestError` at the boundary.
#[derive(Error, Debug)]
pub(crate) enum InternalError {
    #[error("The main looper has quit")]
    LooperQuit,
    #[error("A task panicked on the main thread")]
    Panicked(String),
}

pub(crate) type InternalResult<T> = std::result::Result<T, InternalError>;

impl From<RecvError> for InternalError {
    fn from(_: RecvError) -> Self {
        InternalError::LooperQuit
    }
}

impl From<InternalError> for TestError {
    fn from(value: InternalError) -> Self {
        match value {
            InternalError::LooperQuit => {
                TestError::IllegalState("the main looper is no longer running".to_string())
            }
            InternalError::Panicked(msg) => TestError::MainThreadPanic(msg),
        }
    }
}

/// Fails with [`TestError::IllegalState`] carrying `msg` unless `cond` holds.
pub fn check_state(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(TestError::IllegalState(msg()))
    }
}

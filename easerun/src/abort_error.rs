use thiserror::Error;

/// Errors a wrapped function can report when it gives up early.
///
/// The runners treat every failure alike. Returning one of these lets readers
/// of the state tell an abort or a timeout apart from a genuine failure.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AbortError {
    /// The abort signal fired before the work completed.
    #[error("Task was aborted!")]
    Aborted,

    /// The work did not complete within its deadline.
    #[error("deadline has elapsed!")]
    Timeout,

    /// A general failure with a message describing what went wrong.
    #[error("{0}")]
    Failed(String),
}

impl AbortError {
    pub fn failed(message: impl Into<String>) -> Self {
        AbortError::Failed(message.into())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, AbortError::Aborted)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AbortError::Timeout)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AbortError::Failed(_))
    }
}

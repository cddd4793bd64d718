use crate::Status;

/// Snapshot of one runner's execution.
///
/// Only the runner writes it. Readers get clones through
/// [`AsyncRunner::state`](crate::AsyncRunner::state) or the state signal.
///
/// The fields keep these invariants:
/// - `Done` never carries an error
/// - `Failed` never carries data
/// - `Initial` carries neither
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExecutionState<T, E> {
    pub status: Status,
    pub data: Option<T>,
    pub error: Option<E>,
}

impl<T, E> ExecutionState<T, E> {
    pub fn initial() -> Self {
        ExecutionState {
            status: Status::Initial,
            data: None,
            error: None,
        }
    }

    pub fn done(data: T) -> Self {
        ExecutionState {
            status: Status::Done,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: E) -> Self {
        ExecutionState {
            status: Status::Failed,
            data: None,
            error: Some(error),
        }
    }

    /// Moves into `Working`. The error is cleared, the last data stays readable.
    pub fn working(self) -> Self {
        ExecutionState {
            status: Status::Working,
            data: self.data,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_working()
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.status, Status::Initial)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, Status::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, Status::Failed)
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn data_ref(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error_ref(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// The outcome of the last settled trigger, or `None` while idle or working.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match (self.status, self.data, self.error) {
            (Status::Done, Some(data), _) => Some(Ok(data)),
            (Status::Failed, _, Some(error)) => Some(Err(error)),
            _ => None,
        }
    }
}

impl<T, E> Default for ExecutionState<T, E> {
    fn default() -> Self {
        ExecutionState::initial()
    }
}

/// Serialized as `{status, error, data, isLoading}`.
#[cfg(feature = "serde")]
impl<T, E> serde::Serialize for ExecutionState<T, E>
where
    T: serde::Serialize,
    E: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut snapshot = serializer.serialize_struct("ExecutionState", 4)?;
        snapshot.serialize_field("status", &self.status)?;
        snapshot.serialize_field("error", &self.error)?;
        snapshot.serialize_field("data", &self.data)?;
        snapshot.serialize_field("isLoading", &self.is_loading())?;
        snapshot.end()
    }
}

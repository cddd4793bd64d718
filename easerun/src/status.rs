use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lifecycle tag of a runner's execution state.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Status {
    /// No trigger has run yet.
    #[default]
    Initial,
    /// A trigger is in flight.
    Working,
    /// The last settled trigger succeeded.
    Done,
    /// The last settled trigger failed.
    Failed,
}

/// Every status, in lifecycle order.
pub const STATUSES: [Status; 4] = [
    Status::Initial,
    Status::Working,
    Status::Done,
    Status::Failed,
];

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("unknown status tag: {0}")]
pub struct UnknownStatus(pub String);

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Initial => "INITIAL",
            Status::Working => "WORKING",
            Status::Done => "DONE",
            Status::Failed => "FAILED",
        }
    }

    pub fn is_working(&self) -> bool {
        matches!(self, Status::Working)
    }

    /// Done or Failed. Terminal only until the next trigger.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STATUSES
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

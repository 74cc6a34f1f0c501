//! Shared error types for the services crate.

use thiserror::Error;

use quiz_api::ApiError;
use quiz_core::machine::MachineError;
use quiz_core::model::{ChallengeError, ItemError, ItemId, RoundError, RoundSummaryError};

/// Why a round could not be loaded. The controller stays `Idle` so the load can be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadError {
    #[error("round not found")]
    NotFound,
    #[error("round is already closed")]
    Closed,
    #[error("round has no items")]
    Empty,
    #[error(transparent)]
    MalformedItem(ItemError),
    #[error(transparent)]
    Invalid(RoundError),
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for LoadError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound => Self::NotFound,
            ApiError::Closed => Self::Closed,
            ApiError::InvalidRound(RoundError::Empty) => Self::Empty,
            ApiError::InvalidRound(e) => Self::Invalid(e),
            ApiError::InvalidItem(e) => Self::MalformedItem(e),
            other => Self::Api(other),
        }
    }
}

/// Bad participant input, rejected before any state change or network call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("participant name cannot be empty")]
    EmptyName,
    #[error("{value:?} is not an option of item {item}")]
    UnknownOption { item: ItemId, value: String },
}

/// Errors emitted by `ResultSubmitter`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("submission was rejected by the backend")]
    Rejected,
    #[error("submission task ended unexpectedly: {0}")]
    Interrupted(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `RoundController`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ControllerError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("join failed: {0}")]
    Join(ApiError),
    #[error(transparent)]
    Summary(#[from] RoundSummaryError),
    #[error(transparent)]
    Machine(MachineError),
}

impl From<MachineError> for ControllerError {
    fn from(err: MachineError) -> Self {
        match err {
            MachineError::EmptyName => Self::Validation(ValidationError::EmptyName),
            MachineError::UnknownOption { item, value } => {
                Self::Validation(ValidationError::UnknownOption { item, value })
            }
            other => Self::Machine(other),
        }
    }
}

/// Errors emitted by `HostService`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
    #[error(transparent)]
    Draft(#[from] ChallengeError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_load_reasons() {
        assert_eq!(LoadError::from(ApiError::NotFound), LoadError::NotFound);
        assert_eq!(
            LoadError::from(ApiError::InvalidRound(RoundError::Empty)),
            LoadError::Empty
        );
        assert!(matches!(
            LoadError::from(ApiError::Transport("down".into())),
            LoadError::Api(_)
        ));
    }

    #[test]
    fn machine_input_errors_become_validation_errors() {
        assert_eq!(
            ControllerError::from(MachineError::EmptyName),
            ControllerError::Validation(ValidationError::EmptyName)
        );
    }
}

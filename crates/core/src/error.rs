use thiserror::Error;

use crate::machine::MachineError;
use crate::model::{
    ChallengeError, ItemError, PracticeError, RoundError, RoundSummaryError, SettlementError,
};

/// Any domain validation failure raised by this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Round(#[from] RoundError),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Summary(#[from] RoundSummaryError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Practice(#[from] PracticeError),
}

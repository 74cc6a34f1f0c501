use crate::model::{AnswerSet, ParticipantId, RoundSource};

/// Final payload for one participant's round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub source: RoundSource,
    pub participant: ParticipantId,
    pub answers: AnswerSet,
}

/// Backend acknowledgement of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmitReceipt {
    pub accepted: bool,
    pub score: Option<u32>,
}

impl SubmitReceipt {
    #[must_use]
    pub fn accepted(score: Option<u32>) -> Self {
        Self {
            accepted: true,
            score,
        }
    }

    #[must_use]
    pub fn rejected() -> Self {
        Self {
            accepted: false,
            score: None,
        }
    }
}

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{AnswerSet, ParticipantId, RoundSource};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoundSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("answered ({answered}) exceeds total items ({total})")]
    CountMismatch { total: u32, answered: u32 },

    #[error("too many answers for a single round: {len}")]
    TooManyAnswers { len: usize },
}

/// Aggregate summary for a finished round, handed to the application shell
/// (leaderboard view, reward hand-off) once the submission is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    source: RoundSource,
    participant: ParticipantId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_items: u32,
    answered: u32,
    no_answer: u32,
    score: Option<u32>,
}

impl RoundSummary {
    /// Build a summary from the final answer set.
    ///
    /// # Errors
    ///
    /// Returns `RoundSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `RoundSummaryError::CountMismatch` if there are more answers than items.
    pub fn from_answers(
        source: RoundSource,
        participant: ParticipantId,
        total_items: usize,
        answers: &AnswerSet,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, RoundSummaryError> {
        if completed_at < started_at {
            return Err(RoundSummaryError::InvalidTimeRange);
        }
        let to_u32 = |len: usize| {
            u32::try_from(len).map_err(|_| RoundSummaryError::TooManyAnswers { len })
        };
        let total = to_u32(total_items)?;
        let recorded = to_u32(answers.len())?;
        let no_answer = to_u32(answers.no_answer_count())?;

        if recorded > total {
            return Err(RoundSummaryError::CountMismatch {
                total,
                answered: recorded,
            });
        }

        Ok(Self {
            source,
            participant,
            started_at,
            completed_at,
            total_items: total,
            answered: recorded - no_answer,
            no_answer,
            score: None,
        })
    }

    /// Attach the score reported by the backend, if any.
    #[must_use]
    pub fn with_score(mut self, score: Option<u32>) -> Self {
        self.score = score;
        self
    }

    #[must_use]
    pub fn source(&self) -> &RoundSource {
        &self.source
    }

    #[must_use]
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.total_items
    }

    /// Items with an explicit choice.
    #[must_use]
    pub fn answered(&self) -> u32 {
        self.answered
    }

    /// Items that timed out or were skipped.
    #[must_use]
    pub fn no_answer(&self) -> u32 {
        self.no_answer
    }

    #[must_use]
    pub fn score(&self) -> Option<u32> {
        self.score
    }

    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, ItemId, RoundId, RoundKind};
    use crate::time::fixed_now;

    fn source() -> RoundSource {
        RoundSource::new(RoundKind::Quiz, RoundId::new("quiz-1"))
    }

    #[test]
    fn summary_counts_answers_and_timeouts() {
        let now = fixed_now();
        let answers: AnswerSet = [
            (ItemId::new("1"), Answer::choice("a")),
            (ItemId::new("2"), Answer::NoAnswer),
            (ItemId::new("3"), Answer::choice("c")),
        ]
        .into_iter()
        .collect();

        let summary = RoundSummary::from_answers(
            source(),
            ParticipantId::new("0xabc"),
            3,
            &answers,
            now,
            now + chrono::Duration::seconds(45),
        )
        .unwrap()
        .with_score(Some(2));

        assert_eq!(summary.total_items(), 3);
        assert_eq!(summary.answered(), 2);
        assert_eq!(summary.no_answer(), 1);
        assert_eq!(summary.score(), Some(2));
        assert_eq!(summary.duration().num_seconds(), 45);
    }

    #[test]
    fn summary_rejects_inverted_time_range() {
        let now = fixed_now();
        let err = RoundSummary::from_answers(
            source(),
            ParticipantId::new("0xabc"),
            1,
            &AnswerSet::new(),
            now,
            now - chrono::Duration::seconds(1),
        )
        .unwrap_err();
        assert_eq!(err, RoundSummaryError::InvalidTimeRange);
    }

    #[test]
    fn summary_rejects_more_answers_than_items() {
        let now = fixed_now();
        let answers: AnswerSet = [
            (ItemId::new("1"), Answer::choice("a")),
            (ItemId::new("2"), Answer::choice("b")),
        ]
        .into_iter()
        .collect();
        let err = RoundSummary::from_answers(
            source(),
            ParticipantId::new("0xabc"),
            1,
            &answers,
            now,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, RoundSummaryError::CountMismatch { total: 1, answered: 2 }));
    }
}

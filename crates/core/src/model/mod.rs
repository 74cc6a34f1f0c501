mod answer;
mod challenge;
mod ids;
mod item;
mod leaderboard;
mod practice;
mod round;
mod session;
mod submission;

pub use answer::{Answer, AnswerSet, NO_ANSWER};
pub use challenge::{
    ChallengeDraft, ChallengeError, CreatedRound, Difficulty, DraftContent, MAX_ITEMS_PER_ROUND,
    Settlement, SettlementError, VideoUrl,
};
pub use ids::{ItemId, ParseIdError, ParticipantId, RoundId};
pub use item::{Item, ItemError, TRUE_FALSE_OPTIONS};
pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardSort};
pub use practice::{
    PracticeError, PracticeGame, PracticeRequest, PracticeRound, TYPING_ROUND_SECONDS,
};
pub use round::{DEFAULT_ITEM_SECONDS, Round, RoundError, RoundKind, RoundSource};
pub use session::{RoundSummary, RoundSummaryError};
pub use submission::{Submission, SubmitReceipt};

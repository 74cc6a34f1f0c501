use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::model::ids::{ParticipantId, RoundId};
use crate::model::round::RoundKind;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeError {
    #[error("creator name cannot be empty")]
    EmptyCreatorName,

    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("participant count must be > 0")]
    NoParticipants,

    #[error("item count must be between 1 and {max}")]
    InvalidItemCount { max: u32 },

    #[error("reward per score must be > 0")]
    ZeroReward,

    #[error("escrow budget overflows")]
    BudgetOverflow,

    #[error("unknown difficulty: {0}")]
    UnknownDifficulty(String),

    #[error("invalid video url: {0}")]
    InvalidVideoUrl(String),

    #[error("{kind} rounds cannot be created from a {content}")]
    UnsupportedContent {
        kind: RoundKind,
        content: &'static str,
    },

    #[error("{0} rounds are generated on demand and cannot be hosted")]
    NotHostable(RoundKind),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettlementError {
    #[error("settlement is missing a game id")]
    MissingGameId,

    #[error("{participants} participants but {rewards} rewards")]
    LengthMismatch { participants: usize, rewards: usize },
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Hard cap on items per round enforced by the create forms.
pub const MAX_ITEMS_PER_ROUND: u32 = 30;

/// Escrow is the raw payout plus a 10% margin.
const ESCROW_MARGIN_PERCENT: u128 = 110;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(ChallengeError::UnknownDifficulty(other.to_owned())),
        }
    }
}

//
// ─── VIDEO URL ─────────────────────────────────────────────────────────────────
//

const VIDEO_ID_LEN: usize = 11;

/// A YouTube watch, shorts, or short-link URL with an 11 character video id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUrl {
    url: Url,
    video_id: String,
}

impl VideoUrl {
    /// # Errors
    ///
    /// Returns `ChallengeError::InvalidVideoUrl` for anything that is not a YouTube
    /// video link.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ChallengeError> {
        let raw = raw.as_ref().trim();
        let invalid = |reason: &str| ChallengeError::InvalidVideoUrl(format!("{raw}: {reason}"));
        if raw.is_empty() {
            return Err(invalid("url is required"));
        }
        let url = Url::parse(raw).map_err(|_| invalid("not a url"))?;

        let video_id = match url.host_str() {
            Some("youtube.com" | "www.youtube.com") => {
                if url.path() == "/watch" {
                    url.query_pairs()
                        .find(|(key, _)| key == "v")
                        .map(|(_, value)| value.into_owned())
                        .ok_or_else(|| invalid("missing video id"))?
                } else if let Some(id) = url.path().strip_prefix("/shorts/") {
                    id.to_owned()
                } else {
                    return Err(invalid("unsupported youtube path"));
                }
            }
            Some("youtu.be") => url.path().trim_start_matches('/').to_owned(),
            _ => return Err(invalid("not a youtube url")),
        };

        if video_id.len() != VIDEO_ID_LEN {
            return Err(invalid("video id must be 11 characters"));
        }
        Ok(Self { url, video_id })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    #[must_use]
    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

impl fmt::Display for VideoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── DRAFT CONTENT ─────────────────────────────────────────────────────────────
//

/// What the backend generates a round's items from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftContent {
    /// Free-form topic or prompt.
    Topic(String),
    /// Quiz questions generated from a video transcript.
    Video(VideoUrl),
}

impl DraftContent {
    fn label(&self) -> &'static str {
        match self {
            DraftContent::Topic(_) => "topic",
            DraftContent::Video(_) => "video",
        }
    }
}

/// Host input for creating a new round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDraft {
    pub kind: RoundKind,
    pub creator_name: String,
    pub content: DraftContent,
    pub participants: u32,
    pub item_count: u32,
    /// Reward per correct answer, in wei.
    pub reward_per_score: u128,
    pub difficulty: Difficulty,
    pub creator: ParticipantId,
}

impl ChallengeDraft {
    /// Check every field the create form requires.
    ///
    /// # Errors
    ///
    /// Returns the first `ChallengeError` found.
    pub fn validate(&self) -> Result<(), ChallengeError> {
        if self.kind.is_practice() {
            return Err(ChallengeError::NotHostable(self.kind));
        }
        if self.creator_name.trim().is_empty() {
            return Err(ChallengeError::EmptyCreatorName);
        }
        match (&self.content, self.kind) {
            (DraftContent::Topic(topic), _) if topic.trim().is_empty() => {
                return Err(ChallengeError::EmptyTopic);
            }
            (DraftContent::Video(_), kind) if kind != RoundKind::Quiz => {
                return Err(ChallengeError::UnsupportedContent {
                    kind,
                    content: self.content.label(),
                });
            }
            _ => {}
        }
        if self.participants == 0 {
            return Err(ChallengeError::NoParticipants);
        }
        if self.item_count == 0 || self.item_count > MAX_ITEMS_PER_ROUND {
            return Err(ChallengeError::InvalidItemCount {
                max: MAX_ITEMS_PER_ROUND,
            });
        }
        if self.reward_per_score == 0 {
            return Err(ChallengeError::ZeroReward);
        }
        Ok(())
    }

    /// Amount (wei) the host escrows: `reward × participants × items × 110 / 100`.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::BudgetOverflow` if the product does not fit in `u128`.
    pub fn escrow_budget(&self) -> Result<u128, ChallengeError> {
        self.reward_per_score
            .checked_mul(u128::from(self.participants))
            .and_then(|v| v.checked_mul(u128::from(self.item_count)))
            .and_then(|v| v.checked_mul(ESCROW_MARGIN_PERCENT))
            .map(|v| v / 100)
            .ok_or(ChallengeError::BudgetOverflow)
    }
}

//
// ─── SETTLEMENT ────────────────────────────────────────────────────────────────
//

/// Close-out data returned when a host finishes a round: who gets paid what.
///
/// The payout itself belongs to the external contract service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    game_id: String,
    payouts: Vec<(ParticipantId, u128)>,
}

impl Settlement {
    /// Pair participants with rewards.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError` if the game id is blank or the lists differ in length.
    pub fn new(
        game_id: impl Into<String>,
        participants: Vec<ParticipantId>,
        rewards: Vec<u128>,
    ) -> Result<Self, SettlementError> {
        let game_id = game_id.into();
        if game_id.trim().is_empty() {
            return Err(SettlementError::MissingGameId);
        }
        if participants.len() != rewards.len() {
            return Err(SettlementError::LengthMismatch {
                participants: participants.len(),
                rewards: rewards.len(),
            });
        }
        Ok(Self {
            game_id,
            payouts: participants.into_iter().zip(rewards).collect(),
        })
    }

    #[must_use]
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    #[must_use]
    pub fn payouts(&self) -> &[(ParticipantId, u128)] {
        &self.payouts
    }

    #[must_use]
    pub fn total(&self) -> u128 {
        self.payouts
            .iter()
            .fold(0_u128, |acc, (_, r)| acc.saturating_add(*r))
    }
}

/// Identifier of a freshly created round plus the budget the host must escrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRound {
    pub id: RoundId,
    pub escrow_budget: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

    fn draft() -> ChallengeDraft {
        ChallengeDraft {
            kind: RoundKind::FactCheck,
            creator_name: "host".into(),
            content: DraftContent::Topic("space".into()),
            participants: 4,
            item_count: 10,
            reward_per_score: ONE_TOKEN,
            difficulty: Difficulty::Medium,
            creator: ParticipantId::new("0xhost"),
        }
    }

    #[test]
    fn budget_adds_ten_percent_margin() {
        assert_eq!(draft().escrow_budget().unwrap(), 44 * ONE_TOKEN);
    }

    #[test]
    fn budget_overflow_is_reported() {
        let mut d = draft();
        d.reward_per_score = u128::MAX;
        assert_eq!(d.escrow_budget(), Err(ChallengeError::BudgetOverflow));
    }

    #[test]
    fn item_cap_is_enforced() {
        let mut d = draft();
        d.item_count = 31;
        assert_eq!(
            d.validate(),
            Err(ChallengeError::InvalidItemCount { max: 30 })
        );
        d.item_count = 30;
        assert!(d.validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut d = draft();
        d.content = DraftContent::Topic(" ".into());
        assert_eq!(d.validate(), Err(ChallengeError::EmptyTopic));
    }

    #[test]
    fn video_drafts_are_quiz_only() {
        let video = VideoUrl::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(video.video_id(), "dQw4w9WgXcQ");

        let mut d = draft();
        d.content = DraftContent::Video(video);
        assert_eq!(
            d.validate(),
            Err(ChallengeError::UnsupportedContent {
                kind: RoundKind::FactCheck,
                content: "video"
            })
        );
        d.kind = RoundKind::Quiz;
        assert!(d.validate().is_ok());
    }

    #[test]
    fn video_urls_follow_youtube_shapes() {
        assert_eq!(
            VideoUrl::parse("https://youtu.be/dQw4w9WgXcQ").unwrap().video_id(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            VideoUrl::parse("https://youtube.com/shorts/abcdefghijk")
                .unwrap()
                .video_id(),
            "abcdefghijk"
        );
        for bad in [
            "",
            "not a url",
            "https://vimeo.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/playlist?list=abc",
        ] {
            assert!(
                matches!(VideoUrl::parse(bad), Err(ChallengeError::InvalidVideoUrl(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn practice_kinds_cannot_be_hosted() {
        let mut d = draft();
        d.kind = RoundKind::Typing;
        assert_eq!(
            d.validate(),
            Err(ChallengeError::NotHostable(RoundKind::Typing))
        );
    }

    #[test]
    fn settlement_requires_matching_lengths() {
        let err = Settlement::new(
            "7",
            vec![ParticipantId::new("0x1"), ParticipantId::new("0x2")],
            vec![ONE_TOKEN],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SettlementError::LengthMismatch {
                participants: 2,
                rewards: 1
            }
        );

        let ok = Settlement::new("7", vec![ParticipantId::new("0x1")], vec![ONE_TOKEN]).unwrap();
        assert_eq!(ok.total(), ONE_TOKEN);
    }
}

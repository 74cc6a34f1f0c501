//! Typing and memory rounds: generated word lists and sequences laid out as timed
//! items and scored on the client.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::answer::{Answer, AnswerSet};
use crate::model::challenge::Difficulty;
use crate::model::ids::{ItemId, RoundId};
use crate::model::item::{Item, ItemError};
use crate::model::round::{Round, RoundError, RoundKind, RoundSource};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("typing category cannot be empty")]
    EmptyCategory,

    #[error(transparent)]
    Round(#[from] RoundError),

    #[error(transparent)]
    Item(#[from] ItemError),
}

//
// ─── REQUEST ───────────────────────────────────────────────────────────────────
//

/// Length of a whole typing game, split evenly across the fetched words.
pub const TYPING_ROUND_SECONDS: u32 = 60;

const MEMORY_SECONDS_PER_ELEMENT: u32 = 2;
const MEMORY_HARD_MIN_SECONDS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeGame {
    Typing { category: String },
    Memory,
}

impl PracticeGame {
    #[must_use]
    pub fn kind(&self) -> RoundKind {
        match self {
            PracticeGame::Typing { .. } => RoundKind::Typing,
            PracticeGame::Memory => RoundKind::Memory,
        }
    }
}

/// Parameters sent to the generator endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeRequest {
    pub game: PracticeGame,
    pub difficulty: Difficulty,
}

impl PracticeRequest {
    #[must_use]
    pub fn typing(category: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            game: PracticeGame::Typing {
                category: category.into(),
            },
            difficulty,
        }
    }

    #[must_use]
    pub fn memory(difficulty: Difficulty) -> Self {
        Self {
            game: PracticeGame::Memory,
            difficulty,
        }
    }

    /// # Errors
    ///
    /// Returns `PracticeError::EmptyCategory` for a typing request without a category.
    pub fn validate(&self) -> Result<(), PracticeError> {
        match &self.game {
            PracticeGame::Typing { category } if category.trim().is_empty() => {
                Err(PracticeError::EmptyCategory)
            }
            _ => Ok(()),
        }
    }

    /// Local source for the generated round. The backend issues no id for these.
    #[must_use]
    pub fn source(&self) -> RoundSource {
        let id = match &self.game {
            PracticeGame::Typing { category } => {
                format!("{}-{}", category.trim(), self.difficulty)
            }
            PracticeGame::Memory => self.difficulty.to_string(),
        };
        RoundSource::new(self.game.kind(), RoundId::new(id))
    }
}

//
// ─── ROUND ─────────────────────────────────────────────────────────────────────
//

/// A generated round plus the key it is scored against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PracticeRound {
    round: Round,
    key: BTreeMap<ItemId, String>,
    preview: Vec<String>,
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl PracticeRound {
    /// One free-text item per word; the game's minute is shared evenly between them.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError` for an empty list or a blank word.
    pub fn typing(source: RoundSource, words: Vec<String>) -> Result<Self, PracticeError> {
        if words.is_empty() {
            return Err(RoundError::Empty.into());
        }
        let per_item = TYPING_ROUND_SECONDS.div_ceil(count(words.len())).max(1);

        let mut key = BTreeMap::new();
        let mut items = Vec::with_capacity(words.len());
        for (i, word) in words.into_iter().enumerate() {
            let id = ItemId::new(format!("w{}", i + 1));
            let word = word.trim().to_owned();
            items.push(Item::new(id.clone(), word.clone(), Vec::new())?);
            key.insert(id, word);
        }

        let title = format!("typing {}", source.id);
        Ok(Self {
            round: Round::new(source, items, per_item)?.with_title(title),
            key,
            preview: Vec::new(),
        })
    }

    /// One item per sequence position; each offers every distinct element.
    ///
    /// Recall time is two seconds per element plus a difficulty bonus (hard rounds
    /// get at least twenty seconds overall), shared evenly between the positions.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError` for an empty sequence or a blank element.
    pub fn memory(
        source: RoundSource,
        sequence: Vec<String>,
        difficulty: Difficulty,
    ) -> Result<Self, PracticeError> {
        if sequence.is_empty() {
            return Err(RoundError::Empty.into());
        }
        let n = count(sequence.len());
        let base = n.saturating_mul(MEMORY_SECONDS_PER_ELEMENT);
        let limit = match difficulty {
            Difficulty::Easy => base.saturating_add(5),
            Difficulty::Medium => base.saturating_add(3),
            Difficulty::Hard => base.max(MEMORY_HARD_MIN_SECONDS),
        };
        let per_item = limit.div_ceil(n).max(1);

        let sequence: Vec<String> = sequence.into_iter().map(|s| s.trim().to_owned()).collect();
        let options: Vec<String> = sequence
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut key = BTreeMap::new();
        let mut items = Vec::with_capacity(sequence.len());
        for (i, element) in sequence.iter().enumerate() {
            let id = ItemId::new(format!("s{}", i + 1));
            items.push(Item::new(
                id.clone(),
                format!("element {} of {n}", i + 1),
                options.clone(),
            )?);
            key.insert(id, element.clone());
        }

        let title = format!("memory {difficulty}");
        Ok(Self {
            round: Round::new(source, items, per_item)?.with_title(title),
            key,
            preview: sequence,
        })
    }

    #[must_use]
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Sequence to memorise before recall starts; empty for typing rounds.
    #[must_use]
    pub fn preview(&self) -> &[String] {
        &self.preview
    }

    /// Typing: characters of every correct word, minus those of every wrong one, never
    /// below zero. Memory: percentage of positions recalled correctly.
    #[must_use]
    pub fn score(&self, answers: &AnswerSet) -> u32 {
        match self.round.kind() {
            RoundKind::Memory => {
                let total = count(self.key.len()).max(1);
                let correct = count(
                    self.key
                        .iter()
                        .filter(|(id, expected)| {
                            matches!(answers.get(id), Some(Answer::Choice(v)) if v == *expected)
                        })
                        .count(),
                );
                (correct.saturating_mul(100) + total / 2) / total
            }
            _ => self.round.items().iter().fold(0_u32, |score, item| {
                let Some(expected) = self.key.get(item.id()) else {
                    return score;
                };
                let len = count(expected.chars().count());
                match answers.get(item.id()) {
                    Some(Answer::Choice(typed)) if typed.trim() == expected.as_str() => {
                        score.saturating_add(len)
                    }
                    Some(Answer::Choice(_)) => score.saturating_sub(len),
                    _ => score,
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|w| (*w).to_owned()).collect()
    }

    fn answers(raw: &[(&str, Answer)]) -> AnswerSet {
        raw.iter()
            .map(|(id, a)| (ItemId::new(*id), a.clone()))
            .collect()
    }

    #[test]
    fn typing_splits_the_minute_across_words() {
        let request = PracticeRequest::typing("animals", Difficulty::Easy);
        let practice =
            PracticeRound::typing(request.source(), words(&["cat", "horse", "owl", "yak"]))
                .unwrap();
        let round = practice.round();
        assert_eq!(round.kind(), RoundKind::Typing);
        assert_eq!(round.len(), 4);
        assert_eq!(round.per_item_seconds(), 15);
        assert!(round.items()[0].is_free_text());
        assert_eq!(round.items()[1].prompt(), "horse");
        assert!(practice.preview().is_empty());
    }

    #[test]
    fn typing_score_never_goes_negative() {
        let source = PracticeRequest::typing("animals", Difficulty::Easy).source();
        let practice = PracticeRound::typing(source, words(&["cat", "horse", "owl"])).unwrap();
        let typed = answers(&[
            ("w1", Answer::choice("cst")),
            ("w2", Answer::choice("horse")),
            ("w3", Answer::NoAnswer),
        ]);
        assert_eq!(practice.score(&typed), 5);

        let typed = answers(&[("w1", Answer::choice("cat")), ("w2", Answer::choice("hose"))]);
        assert_eq!(practice.score(&typed), 0);
    }

    #[test]
    fn memory_positions_offer_every_distinct_element() {
        let practice = PracticeRound::memory(
            PracticeRequest::memory(Difficulty::Medium).source(),
            words(&["red", "blue", "red", "green"]),
            Difficulty::Medium,
        )
        .unwrap();
        let round = practice.round();
        assert_eq!(round.len(), 4);
        assert_eq!(round.items()[2].options(), ["blue", "green", "red"]);
        // (4 × 2 + 3) seconds shared by four positions.
        assert_eq!(round.per_item_seconds(), 3);
        assert_eq!(practice.preview(), ["red", "blue", "red", "green"]);
    }

    #[test]
    fn hard_memory_rounds_get_twenty_seconds() {
        let practice = PracticeRound::memory(
            PracticeRequest::memory(Difficulty::Hard).source(),
            words(&["a", "b"]),
            Difficulty::Hard,
        )
        .unwrap();
        assert_eq!(practice.round().per_item_seconds(), 10);
    }

    #[test]
    fn memory_score_is_a_percentage() {
        let practice = PracticeRound::memory(
            PracticeRequest::memory(Difficulty::Easy).source(),
            words(&["a", "b", "c"]),
            Difficulty::Easy,
        )
        .unwrap();
        let recalled = answers(&[
            ("s1", Answer::choice("a")),
            ("s2", Answer::choice("c")),
            ("s3", Answer::choice("c")),
        ]);
        assert_eq!(practice.score(&recalled), 67);
    }

    #[test]
    fn empty_generators_are_rejected() {
        let source = PracticeRequest::memory(Difficulty::Easy).source();
        assert_eq!(
            PracticeRound::memory(source, Vec::new(), Difficulty::Easy).unwrap_err(),
            PracticeError::Round(RoundError::Empty)
        );
        assert_eq!(
            PracticeRequest::typing(" ", Difficulty::Easy).validate(),
            Err(PracticeError::EmptyCategory)
        );
    }
}

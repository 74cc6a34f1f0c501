use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ItemId, RoundId};
use crate::model::item::Item;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoundError {
    #[error("round has no items")]
    Empty,

    #[error("item id {0} appears more than once")]
    DuplicateItem(ItemId),

    #[error("per-item duration must be > 0 seconds")]
    ZeroDuration,

    #[error("unknown round kind: {0}")]
    UnknownKind(String),
}

//
// ─── KIND / SOURCE ─────────────────────────────────────────────────────────────
//

/// Default per-item budget used by the quiz and fact-check pages.
pub const DEFAULT_ITEM_SECONDS: u32 = 30;

/// Which backend family serves a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundKind {
    Quiz,
    FactCheck,
    /// Word list from the typing backend, scored on the client.
    Typing,
    /// Sequence recall from the memory-challenge backend, scored on the client.
    Memory,
}

impl RoundKind {
    /// Route segment used by the backend (`/api/{segment}/...`).
    #[must_use]
    pub fn as_path(self) -> &'static str {
        match self {
            RoundKind::Quiz => "quiz",
            RoundKind::FactCheck => "fact-check",
            RoundKind::Typing => "typing",
            RoundKind::Memory => "memory-challenge",
        }
    }

    /// Name of the round id field in submission bodies.
    #[must_use]
    pub fn id_field(self) -> &'static str {
        match self {
            RoundKind::Quiz => "quizId",
            RoundKind::FactCheck => "factCheckId",
            RoundKind::Typing => "typingId",
            RoundKind::Memory => "challengeId",
        }
    }

    /// Practice kinds have no join, submit, leaderboard or host routes.
    #[must_use]
    pub fn is_practice(self) -> bool {
        matches!(self, RoundKind::Typing | RoundKind::Memory)
    }
}

impl fmt::Display for RoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for RoundKind {
    type Err = RoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiz" => Ok(Self::Quiz),
            "fact-check" | "factcheck" | "fact_check" => Ok(Self::FactCheck),
            "typing" => Ok(Self::Typing),
            "memory" | "memory-challenge" => Ok(Self::Memory),
            other => Err(RoundError::UnknownKind(other.to_owned())),
        }
    }
}

/// Where a round is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoundSource {
    pub kind: RoundKind,
    pub id: RoundId,
}

impl RoundSource {
    #[must_use]
    pub fn new(kind: RoundKind, id: RoundId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RoundSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

//
// ─── ROUND ─────────────────────────────────────────────────────────────────────
//

/// An ordered, immutable list of timed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    source: RoundSource,
    title: Option<String>,
    items: Vec<Item>,
    per_item_seconds: u32,
}

impl Round {
    /// Build a validated round.
    ///
    /// # Errors
    ///
    /// Returns `RoundError::Empty` for no items, `RoundError::DuplicateItem` if ids repeat,
    /// and `RoundError::ZeroDuration` if `per_item_seconds` is 0.
    pub fn new(
        source: RoundSource,
        items: Vec<Item>,
        per_item_seconds: u32,
    ) -> Result<Self, RoundError> {
        if items.is_empty() {
            return Err(RoundError::Empty);
        }
        if per_item_seconds == 0 {
            return Err(RoundError::ZeroDuration);
        }
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id()) {
                return Err(RoundError::DuplicateItem(item.id().clone()));
            }
        }

        Ok(Self {
            source,
            title: None,
            items,
            per_item_seconds,
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = (!title.trim().is_empty()).then_some(title);
        self
    }

    #[must_use]
    pub fn source(&self) -> &RoundSource {
        &self.source
    }

    #[must_use]
    pub fn id(&self) -> &RoundId {
        &self.source.id
    }

    #[must_use]
    pub fn kind(&self) -> RoundKind {
        self.source.kind
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for a constructed round; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    #[must_use]
    pub fn per_item_seconds(&self) -> u32 {
        self.per_item_seconds
    }

    /// Upper bound on the round's duration: `items × per_item_seconds`.
    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.per_item_seconds).saturating_mul(self.items.len() as u64)
    }
}

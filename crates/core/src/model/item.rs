use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ItemId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemError {
    #[error("item id cannot be empty")]
    EmptyId,

    #[error("item {0} has an empty prompt")]
    EmptyPrompt(ItemId),

    #[error("item {0} has an empty option")]
    EmptyOption(ItemId),

    #[error("item {id} lists option {option:?} more than once")]
    DuplicateOption { id: ItemId, option: String },
}

//
// ─── ITEM ──────────────────────────────────────────────────────────────────────
//

/// Options offered for a fact-check statement when the backend sends none.
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["true", "false"];

/// One question, fact, or challenge inside a round.
///
/// An empty option list means the item takes free-text answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    prompt: String,
    options: Vec<String>,
}

impl Item {
    /// Build a validated item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError` if the id or prompt is blank, or an option is blank or repeated.
    pub fn new(
        id: ItemId,
        prompt: impl Into<String>,
        options: Vec<String>,
    ) -> Result<Self, ItemError> {
        if id.as_str().trim().is_empty() {
            return Err(ItemError::EmptyId);
        }
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ItemError::EmptyPrompt(id));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(options.len());
        for option in &options {
            if option.trim().is_empty() {
                return Err(ItemError::EmptyOption(id));
            }
            if seen.contains(&option.as_str()) {
                return Err(ItemError::DuplicateOption {
                    id,
                    option: option.clone(),
                });
            }
            seen.push(option);
        }

        Ok(Self {
            id,
            prompt,
            options,
        })
    }

    /// Build a true/false statement item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError` if the id or statement is blank.
    pub fn true_false(id: ItemId, statement: impl Into<String>) -> Result<Self, ItemError> {
        Self::new(
            id,
            statement,
            TRUE_FALSE_OPTIONS.iter().map(|o| (*o).to_owned()).collect(),
        )
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn is_free_text(&self) -> bool {
        self.options.is_empty()
    }

    /// Returns true if `value` is an acceptable answer for this item.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        if self.is_free_text() {
            return !value.trim().is_empty();
        }
        self.options.iter().any(|o| o == value)
    }
}

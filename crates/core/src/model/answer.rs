use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::model::ids::ItemId;

/// Wire value recorded when an item's time runs out before a choice is made.
pub const NO_ANSWER: &str = "no_answer";

/// A participant's response to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Answer {
    Choice(String),
    /// Forced entry written when the item expired or was skipped.
    NoAnswer,
}

impl Answer {
    #[must_use]
    pub fn choice(value: impl Into<String>) -> Self {
        Self::Choice(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Answer::Choice(value) => value,
            Answer::NoAnswer => NO_ANSWER,
        }
    }

    #[must_use]
    pub fn is_no_answer(&self) -> bool {
        matches!(self, Answer::NoAnswer)
    }
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        if value == NO_ANSWER {
            Self::NoAnswer
        } else {
            Self::Choice(value)
        }
    }
}

impl From<Answer> for String {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Choice(value) => value,
            Answer::NoAnswer => NO_ANSWER.to_owned(),
        }
    }
}

/// Answers collected during a round, keyed by item id.
///
/// Entries are only ever added or replaced while their item is current; there is no
/// removal API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    entries: BTreeMap<ItemId, Answer>,
}

impl AnswerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&Answer> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that were forced to `no_answer`.
    #[must_use]
    pub fn no_answer_count(&self) -> usize {
        self.entries.values().filter(|a| a.is_no_answer()).count()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ItemId, Answer> {
        self.entries.iter()
    }

    pub(crate) fn record(&mut self, id: ItemId, answer: Answer) {
        self.entries.insert(id, answer);
    }

    /// Records `no_answer` unless the item already has an entry. Returns true if written.
    pub(crate) fn record_missing(&mut self, id: &ItemId) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.clone(), Answer::NoAnswer);
        true
    }
}

impl<'a> IntoIterator for &'a AnswerSet {
    type Item = (&'a ItemId, &'a Answer);
    type IntoIter = btree_map::Iter<'a, ItemId, Answer>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(ItemId, Answer)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (ItemId, Answer)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_answer_uses_sentinel_on_the_wire() {
        let set: AnswerSet = [
            (ItemId::new("item1"), Answer::choice("true")),
            (ItemId::new("item2"), Answer::NoAnswer),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "item1": "true", "item2": "no_answer" })
        );

        let back: AnswerSet = serde_json::from_value(json).unwrap();
        assert_eq!(back.get(&ItemId::new("item2")), Some(&Answer::NoAnswer));
    }

    #[test]
    fn record_missing_keeps_existing_choice() {
        let mut set = AnswerSet::new();
        set.record(ItemId::new("a"), Answer::choice("false"));
        assert!(!set.record_missing(&ItemId::new("a")));
        assert!(set.record_missing(&ItemId::new("b")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.no_answer_count(), 1);
        assert_eq!(set.get(&ItemId::new("a")), Some(&Answer::choice("false")));
    }
}

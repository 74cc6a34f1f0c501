use std::cmp::Ordering;

use crate::model::ids::ParticipantId;

/// One participant row on a round's leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub participant: ParticipantId,
    pub name: String,
    pub score: u32,
}

/// Ordering offered by the leaderboard view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardSort {
    #[default]
    Score,
    Name,
}

impl std::str::FromStr for LeaderboardSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(Self::Score),
            "name" => Ok(Self::Name),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Participants of a round with their scores, in backend order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    #[must_use]
    pub fn new(entries: Vec<LeaderboardEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.entries.iter().any(|e| &e.participant == participant)
    }

    /// Entries ordered for display. Score sorts descending; ties and name sort are
    /// case-insensitive by name.
    #[must_use]
    pub fn sorted(&self, sort: LeaderboardSort) -> Vec<LeaderboardEntry> {
        let mut rows = self.entries.clone();
        rows.sort_by(|a, b| match sort {
            LeaderboardSort::Score => b.score.cmp(&a.score).then_with(|| by_name(a, b)),
            LeaderboardSort::Name => by_name(a, b),
        });
        rows
    }

    /// Entries whose name contains `term`, case-insensitively. A blank term keeps every row.
    #[must_use]
    pub fn search(&self, term: &str) -> Leaderboard {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }
        Self::new(
            self.entries
                .iter()
                .filter(|e| e.name.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        )
    }
}

fn by_name(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(addr: &str, name: &str, score: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            participant: ParticipantId::new(addr),
            name: name.to_owned(),
            score,
        }
    }

    fn board() -> Leaderboard {
        Leaderboard::new(vec![
            entry("0x1", "carol", 4),
            entry("0x2", "Alice", 7),
            entry("0x3", "bob", 7),
        ])
    }

    #[test]
    fn sorts_by_score_then_name() {
        let names: Vec<_> = board()
            .sorted(LeaderboardSort::Score)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Alice", "bob", "carol"]);
    }

    #[test]
    fn sorts_by_name_case_insensitively() {
        let names: Vec<_> = board()
            .sorted(LeaderboardSort::Name)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["Alice", "bob", "carol"]);
    }

    #[test]
    fn search_filters_by_name() {
        let found = board().search("AL");
        assert_eq!(found.len(), 1);
        assert_eq!(found.entries()[0].participant, ParticipantId::new("0x2"));
        assert_eq!(board().search("  ").len(), 3);
    }
}

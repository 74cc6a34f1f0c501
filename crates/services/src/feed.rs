use quiz_api::{ParticipantSource, ParticipantStream};
use quiz_core::model::{Leaderboard, LeaderboardEntry, LeaderboardSort, RoundSource};

/// Participant list for one round, filtered and ordered for display.
#[derive(Debug)]
pub struct ParticipantFeed {
    stream: ParticipantStream,
    latest: Leaderboard,
    sort: LeaderboardSort,
    search: String,
}

impl ParticipantFeed {
    #[must_use]
    pub fn subscribe(source: &dyn ParticipantSource, round: &RoundSource) -> Self {
        let stream = source.subscribe(round);
        let latest = stream.latest();
        Self {
            stream,
            latest,
            sort: LeaderboardSort::default(),
            search: String::new(),
        }
    }

    #[must_use]
    pub fn with_sort(mut self, sort: LeaderboardSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn set_sort(&mut self, sort: LeaderboardSort) {
        self.sort = sort;
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    #[must_use]
    pub fn latest(&self) -> &Leaderboard {
        &self.latest
    }

    /// Current rows after search and sort.
    #[must_use]
    pub fn view(&self) -> Vec<LeaderboardEntry> {
        self.latest.search(&self.search).sorted(self.sort)
    }

    /// Wait for new participant data and return the refreshed view.
    ///
    /// Returns `None` once the source stops publishing.
    pub async fn next(&mut self) -> Option<Vec<LeaderboardEntry>> {
        let board = self.stream.changed().await?;
        let joined = board
            .entries()
            .iter()
            .filter(|e| !self.latest.contains(&e.participant))
            .count();
        if joined > 0 {
            tracing::debug!(joined, total = board.len(), "participants joined");
        }
        self.latest = board;
        Some(self.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_api::{InMemoryApi, RoundApi};
    use quiz_core::model::{Item, ItemId, ParticipantId, Round, RoundId, RoundKind};

    fn source() -> RoundSource {
        RoundSource::new(RoundKind::Quiz, RoundId::new("q1"))
    }

    #[tokio::test]
    async fn joins_are_pushed_to_the_feed() {
        let api = InMemoryApi::new();
        let item = Item::new(ItemId::new("1"), "pick", vec!["a".into()]).unwrap();
        api.insert_round(Round::new(source(), vec![item], 30).unwrap())
            .unwrap();

        let mut feed = ParticipantFeed::subscribe(&api, &source()).with_sort(LeaderboardSort::Name);
        assert!(feed.view().is_empty());

        api.join(&source(), &ParticipantId::new("0x2"), "zed")
            .await
            .unwrap();
        assert_eq!(feed.next().await.unwrap().len(), 1);

        api.join(&source(), &ParticipantId::new("0x1"), "Ada")
            .await
            .unwrap();
        let rows = feed.next().await.unwrap();
        assert_eq!(rows[0].name, "Ada");
        assert_eq!(rows[1].name, "zed");

        feed.set_search("ZE");
        assert_eq!(feed.view().len(), 1);
    }
}

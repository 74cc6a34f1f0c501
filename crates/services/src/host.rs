use std::sync::Arc;

use quiz_api::HostApi;
use quiz_core::model::{ChallengeDraft, CreatedRound, RoundSource, Settlement};

use crate::error::HostError;

/// Host-side round lifecycle: create, open, close.
///
/// Escrow and payout transactions belong to the external contract service; this
/// only produces the numbers it needs.
#[derive(Clone)]
pub struct HostService {
    api: Arc<dyn HostApi>,
}

impl HostService {
    #[must_use]
    pub fn new(api: Arc<dyn HostApi>) -> Self {
        Self { api }
    }

    /// Validate the draft, create the round and report the escrow budget.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Draft` for an invalid draft (nothing is sent), or
    /// `HostError::Api` if the backend call fails.
    pub async fn create(&self, draft: &ChallengeDraft) -> Result<CreatedRound, HostError> {
        draft.validate()?;
        let escrow_budget = draft.escrow_budget()?;
        let id = self.api.create_round(draft).await?;
        tracing::info!(kind = %draft.kind, %id, escrow_budget, "round created");
        Ok(CreatedRound { id, escrow_budget })
    }

    /// Make the round visible to participants.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Api` if the backend call fails.
    pub async fn open(&self, source: &RoundSource) -> Result<(), HostError> {
        self.api.set_public(source, true).await?;
        tracing::info!(%source, "round opened");
        Ok(())
    }

    /// Hide the round without finishing it.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Api` if the backend call fails.
    pub async fn hide(&self, source: &RoundSource) -> Result<(), HostError> {
        self.api.set_public(source, false).await?;
        tracing::info!(%source, "round hidden");
        Ok(())
    }

    /// Attach the escrow contract's game id so settlement refers to it.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Api` if the backend call fails.
    pub async fn link(&self, source: &RoundSource, game_id: &str) -> Result<(), HostError> {
        let game_id = game_id.trim();
        self.api.link_game(source, game_id).await?;
        tracing::info!(%source, game_id, "escrow game linked");
        Ok(())
    }

    /// Finish the round and return the payout list for the contract service.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Api` if the backend call fails or the payout list is inconsistent.
    pub async fn close(&self, source: &RoundSource) -> Result<Settlement, HostError> {
        let settlement = self.api.finish(source).await?;
        tracing::info!(
            %source,
            game_id = settlement.game_id(),
            payouts = settlement.payouts().len(),
            "round closed"
        );
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_api::InMemoryApi;
    use quiz_core::model::{
        ChallengeError, Difficulty, DraftContent, Item, ItemId, ParticipantId, Round, RoundId,
        RoundKind,
    };

    fn draft() -> ChallengeDraft {
        ChallengeDraft {
            kind: RoundKind::Quiz,
            creator_name: "host".into(),
            content: DraftContent::Topic("rust".into()),
            participants: 2,
            item_count: 5,
            reward_per_score: 100,
            difficulty: Difficulty::Medium,
            creator: ParticipantId::new("0xhost"),
        }
    }

    #[tokio::test]
    async fn create_reports_escrow_budget() {
        let api = InMemoryApi::new();
        let host = HostService::new(Arc::new(api.clone()));
        let created = host.create(&draft()).await.unwrap();
        assert_eq!(created.escrow_budget, 1_100);
        assert_eq!(api.drafts().len(), 1);
    }

    #[tokio::test]
    async fn invalid_draft_is_not_sent() {
        let api = InMemoryApi::new();
        let host = HostService::new(Arc::new(api.clone()));
        let mut bad = draft();
        bad.item_count = 0;
        assert_eq!(
            host.create(&bad).await.unwrap_err(),
            HostError::Draft(ChallengeError::InvalidItemCount { max: 30 })
        );
        assert!(api.drafts().is_empty());
    }

    fn stored_round(api: &InMemoryApi) -> RoundSource {
        let source = RoundSource::new(RoundKind::Quiz, RoundId::new("q1"));
        let item = Item::new(ItemId::new("a"), "?", vec!["x".into(), "y".into()]).unwrap();
        api.insert_round(Round::new(source.clone(), vec![item], 10).unwrap())
            .unwrap();
        source
    }

    #[tokio::test]
    async fn hide_and_open_toggle_visibility() {
        let api = InMemoryApi::new();
        let host = HostService::new(Arc::new(api.clone()));
        let source = stored_round(&api);

        host.hide(&source).await.unwrap();
        assert!(!api.is_public(&source));
        host.open(&source).await.unwrap();
        assert!(api.is_public(&source));
    }

    #[tokio::test]
    async fn linked_game_id_flows_into_settlement() {
        let api = InMemoryApi::new();
        let host = HostService::new(Arc::new(api.clone()));
        let source = stored_round(&api);

        host.link(&source, " 77 ").await.unwrap();
        assert_eq!(api.game_id(&source).as_deref(), Some("77"));
        assert_eq!(host.close(&source).await.unwrap().game_id(), "77");
    }
}

//! Typing and memory rounds played through the regular `RoundController`.
//!
//! The backend only generates content for these kinds. Joining, scoring and the
//! leaderboard stay on the client.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use quiz_api::{ApiError, PracticeApi, RoundApi};
use quiz_core::model::{
    Leaderboard, ParticipantId, PracticeRequest, PracticeRound, Round, RoundSource, Submission,
    SubmitReceipt,
};

/// `RoundApi` for one practice game: generates on load, scores locally on submit.
#[derive(Clone)]
pub struct PracticeSession {
    generator: Arc<dyn PracticeApi>,
    request: PracticeRequest,
    current: Arc<Mutex<Option<PracticeRound>>>,
}

impl PracticeSession {
    #[must_use]
    pub fn new(generator: Arc<dyn PracticeApi>, request: PracticeRequest) -> Self {
        Self {
            generator,
            request,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Source to pass to `RoundController::load_round`.
    #[must_use]
    pub fn source(&self) -> RoundSource {
        self.request.source()
    }

    /// Sequence to show before recall starts. Empty until loaded and for typing games.
    #[must_use]
    pub fn preview(&self) -> Vec<String> {
        self.lock()
            .ok()
            .and_then(|g| g.as_ref().map(|p| p.preview().to_vec()))
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<PracticeRound>>, ApiError> {
        self.current
            .lock()
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    fn check_source(&self, source: &RoundSource) -> Result<(), ApiError> {
        if *source == self.request.source() {
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}

#[async_trait]
impl RoundApi for PracticeSession {
    async fn load_round(
        &self,
        source: &RoundSource,
        _participant: &ParticipantId,
    ) -> Result<Round, ApiError> {
        self.check_source(source)?;
        let practice = self.generator.generate(&self.request).await?;
        let round = practice.round().clone();
        *self.lock()? = Some(practice);
        tracing::debug!(%source, items = round.len(), "practice round generated");
        Ok(round)
    }

    async fn join(
        &self,
        source: &RoundSource,
        _participant: &ParticipantId,
        _name: &str,
    ) -> Result<(), ApiError> {
        self.check_source(source)?;
        if self.lock()?.is_none() {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError> {
        self.check_source(&submission.source)?;
        let guard = self.lock()?;
        let practice = guard.as_ref().ok_or(ApiError::NotFound)?;
        let score = practice.score(&submission.answers);
        tracing::info!(source = %submission.source, score, "practice round scored");
        Ok(SubmitReceipt::accepted(Some(score)))
    }

    async fn leaderboard(&self, source: &RoundSource) -> Result<Leaderboard, ApiError> {
        Err(ApiError::Unsupported(format!(
            "{} rounds keep no leaderboard",
            source.kind
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_api::InMemoryApi;
    use quiz_core::model::{Answer, AnswerSet, Difficulty, ItemId, RoundKind};

    fn session(api: &InMemoryApi, request: PracticeRequest) -> PracticeSession {
        PracticeSession::new(Arc::new(api.clone()), request)
    }

    fn typed(raw: &[(&str, &str)]) -> AnswerSet {
        raw.iter()
            .map(|(id, v)| (ItemId::new(*id), Answer::choice(*v)))
            .collect()
    }

    #[tokio::test]
    async fn load_generates_and_submit_scores_locally() {
        let api = InMemoryApi::new();
        api.set_generated(RoundKind::Typing, ["cat".to_owned(), "owl".to_owned()])
            .unwrap();
        let practice = session(&api, PracticeRequest::typing("animals", Difficulty::Easy));
        let source = practice.source();
        let wallet = ParticipantId::new("0xabc");

        let round = practice.load_round(&source, &wallet).await.unwrap();
        assert_eq!(round.len(), 2);
        practice.join(&source, &wallet, "ada").await.unwrap();

        let submission = Submission {
            source: source.clone(),
            participant: wallet,
            answers: typed(&[("w1", "cat"), ("w2", "own")]),
        };
        let receipt = practice.submit(&submission).await.unwrap();
        assert_eq!(receipt, SubmitReceipt::accepted(Some(0)));
        assert_eq!(api.practice_requests().len(), 1);
        assert!(api.submissions().is_empty());
    }

    #[tokio::test]
    async fn other_sources_and_leaderboards_are_refused() {
        let api = InMemoryApi::new();
        api.set_generated(RoundKind::Memory, ["1".to_owned()]).unwrap();
        let practice = session(&api, PracticeRequest::memory(Difficulty::Hard));
        let wallet = ParticipantId::new("0xabc");
        let other = PracticeRequest::memory(Difficulty::Easy).source();

        assert_eq!(
            practice.load_round(&other, &wallet).await.unwrap_err(),
            ApiError::NotFound
        );
        assert_eq!(
            practice.join(&practice.source(), &wallet, "ada").await.unwrap_err(),
            ApiError::NotFound
        );
        assert!(matches!(
            practice.leaderboard(&practice.source()).await,
            Err(ApiError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn preview_is_available_after_load() {
        let api = InMemoryApi::new();
        api.set_generated(RoundKind::Memory, ["🍎".to_owned(), "🍌".to_owned()])
            .unwrap();
        let practice = session(&api, PracticeRequest::memory(Difficulty::Medium));
        assert!(practice.preview().is_empty());

        practice
            .load_round(&practice.source(), &ParticipantId::new("0xabc"))
            .await
            .unwrap();
        assert_eq!(practice.preview(), ["🍎", "🍌"]);
    }
}

use async_trait::async_trait;
use quiz_core::model::{
    ChallengeDraft, ItemError, ItemId, Leaderboard, LeaderboardEntry, ParticipantId,
    PracticeError, PracticeGame, PracticeRequest, PracticeRound, Round, RoundError, RoundId,
    RoundKind, RoundSource, Settlement, SettlementError, Submission, SubmitReceipt,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::feed::{ParticipantSource, ParticipantStream};

/// Errors surfaced by API adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("round is closed")]
    Closed,

    #[error("request failed with status {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Status { status: u16, message: Option<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported request: {0}")]
    Unsupported(String),

    #[error(transparent)]
    InvalidRound(#[from] RoundError),

    #[error(transparent)]
    InvalidItem(#[from] ItemError),

    #[error(transparent)]
    InvalidSettlement(#[from] SettlementError),

    #[error(transparent)]
    InvalidPractice(#[from] PracticeError),
}

impl ApiError {
    /// Refuse participant and host routes for kinds that only have a generator.
    pub(crate) fn practice_route(kind: RoundKind, route: &str) -> Self {
        Self::Unsupported(format!("{kind} rounds have no {route} route"))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Participant-facing round backend (quiz and fact-check families).
#[async_trait]
pub trait RoundApi: Send + Sync {
    /// Fetch and validate the round the participant is about to play.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound`/`ApiError::Closed` for unavailable rounds, transport
    /// errors, or validation errors for malformed rounds.
    async fn load_round(
        &self,
        source: &RoundSource,
        participant: &ParticipantId,
    ) -> Result<Round, ApiError>;

    /// Register the participant under a display name.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend refuses the join or cannot be reached.
    async fn join(
        &self,
        source: &RoundSource,
        participant: &ParticipantId,
        name: &str,
    ) -> Result<(), ApiError>;

    /// Persist the final answer set. Called at most once per attempt.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError>;

    /// Fetch the current leaderboard.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn leaderboard(&self, source: &RoundSource) -> Result<Leaderboard, ApiError>;
}

/// Host-facing round lifecycle.
#[async_trait]
pub trait HostApi: Send + Sync {
    /// Create a round from a validated draft and return its id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn create_round(&self, draft: &ChallengeDraft) -> Result<RoundId, ApiError>;

    /// Open or hide the round for participants.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn set_public(&self, source: &RoundSource, public: bool) -> Result<(), ApiError>;

    /// Record the escrow contract's game id against the round.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport or server failure.
    async fn link_game(&self, source: &RoundSource, game_id: &str) -> Result<(), ApiError>;

    /// Close the round and fetch the payout list.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidSettlement` if the payout list is inconsistent.
    async fn finish(&self, source: &RoundSource) -> Result<Settlement, ApiError>;
}

/// Generators for the typing and memory games.
#[async_trait]
pub trait PracticeApi: Send + Sync {
    /// Fetch a word list or sequence and lay it out as a scored round.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or `ApiError::InvalidPractice` for an
    /// empty or malformed generator response.
    async fn generate(&self, request: &PracticeRequest) -> Result<PracticeRound, ApiError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

struct StoredRound {
    round: Round,
    answer_key: HashMap<ItemId, String>,
    public: bool,
    closed: bool,
    reward_per_score: u128,
    game_id: Option<String>,
}

#[derive(Default)]
struct Inner {
    rounds: HashMap<RoundSource, StoredRound>,
    boards: HashMap<RoundSource, watch::Sender<Leaderboard>>,
    drafts: Vec<ChallengeDraft>,
    submissions: Vec<Submission>,
    generators: HashMap<RoundKind, Vec<String>>,
    practice_requests: Vec<PracticeRequest>,
    load_failures: VecDeque<ApiError>,
    join_failures: VecDeque<ApiError>,
    submit_failures: VecDeque<ApiError>,
    submit_delay: Option<Duration>,
    join_calls: usize,
    submit_calls: usize,
    next_id: u64,
}

impl Inner {
    fn board(&mut self, source: &RoundSource) -> &watch::Sender<Leaderboard> {
        self.boards
            .entry(source.clone())
            .or_insert_with(|| watch::channel(Leaderboard::default()).0)
    }

    fn upsert_entry(&mut self, source: &RoundSource, entry: LeaderboardEntry) {
        self.board(source).send_if_modified(|board| {
            let mut rows = board.entries().to_vec();
            match rows.iter_mut().find(|e| e.participant == entry.participant) {
                Some(existing) if *existing == entry => return false,
                Some(existing) => *existing = entry,
                None => rows.push(entry),
            }
            *board = Leaderboard::new(rows);
            true
        });
    }
}

/// In-memory backend for tests and offline demos.
///
/// Records every call and lets tests script failures for the next load/join/submit.
#[derive(Clone, Default)]
pub struct InMemoryApi {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, ApiError> {
        self.inner
            .lock()
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    /// Make a round available for loading.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the internal lock is poisoned.
    pub fn insert_round(&self, round: Round) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let source = round.source().clone();
        guard.rounds.insert(
            source,
            StoredRound {
                round,
                answer_key: HashMap::new(),
                public: true,
                closed: false,
                reward_per_score: 0,
                game_id: None,
            },
        );
        Ok(())
    }

    /// Set the correct answers used to score submissions for `source`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the round was never inserted.
    pub fn set_answer_key(
        &self,
        source: &RoundSource,
        key: impl IntoIterator<Item = (ItemId, String)>,
    ) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let stored = guard.rounds.get_mut(source).ok_or(ApiError::NotFound)?;
        stored.answer_key = key.into_iter().collect();
        Ok(())
    }

    /// Fail the next `load_round` call with `err`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the internal lock is poisoned.
    pub fn fail_next_load(&self, err: ApiError) -> Result<(), ApiError> {
        self.lock()?.load_failures.push_back(err);
        Ok(())
    }

    /// Fail the next `join` call with `err`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the internal lock is poisoned.
    pub fn fail_next_join(&self, err: ApiError) -> Result<(), ApiError> {
        self.lock()?.join_failures.push_back(err);
        Ok(())
    }

    /// Fail the next `submit` call with `err`. Calls stack in order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the internal lock is poisoned.
    pub fn fail_next_submit(&self, err: ApiError) -> Result<(), ApiError> {
        self.lock()?.submit_failures.push_back(err);
        Ok(())
    }

    /// Delay every `submit` response, as a slow network would.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the internal lock is poisoned.
    pub fn set_submit_delay(&self, delay: Duration) -> Result<(), ApiError> {
        self.lock()?.submit_delay = Some(delay);
        Ok(())
    }

    /// Number of `submit` calls received, failed ones included.
    #[must_use]
    pub fn submit_calls(&self) -> usize {
        self.lock().map_or(0, |g| g.submit_calls)
    }

    #[must_use]
    pub fn join_calls(&self) -> usize {
        self.lock().map_or(0, |g| g.join_calls)
    }

    /// Successful submissions in arrival order.
    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().map(|g| g.submissions.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn drafts(&self) -> Vec<ChallengeDraft> {
        self.lock().map(|g| g.drafts.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_public(&self, source: &RoundSource) -> bool {
        self.lock()
            .ok()
            .and_then(|g| g.rounds.get(source).map(|r| r.public))
            .unwrap_or(false)
    }

    /// Game id linked through `HostApi::link_game`, if any.
    #[must_use]
    pub fn game_id(&self, source: &RoundSource) -> Option<String> {
        self.lock()
            .ok()
            .and_then(|g| g.rounds.get(source).and_then(|r| r.game_id.clone()))
    }

    /// Words (typing) or sequence elements (memory) served by `PracticeApi::generate`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unsupported` for kinds without a generator.
    pub fn set_generated(
        &self,
        kind: RoundKind,
        values: impl IntoIterator<Item = String>,
    ) -> Result<(), ApiError> {
        if !kind.is_practice() {
            return Err(ApiError::Unsupported(format!("{kind} rounds have no generator")));
        }
        self.lock()?
            .generators
            .insert(kind, values.into_iter().collect());
        Ok(())
    }

    #[must_use]
    pub fn practice_requests(&self) -> Vec<PracticeRequest> {
        self.lock()
            .map(|g| g.practice_requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoundApi for InMemoryApi {
    async fn load_round(
        &self,
        source: &RoundSource,
        _participant: &ParticipantId,
    ) -> Result<Round, ApiError> {
        let mut guard = self.lock()?;
        if let Some(err) = guard.load_failures.pop_front() {
            return Err(err);
        }
        let stored = guard.rounds.get(source).ok_or(ApiError::NotFound)?;
        if stored.closed {
            return Err(ApiError::Closed);
        }
        Ok(stored.round.clone())
    }

    async fn join(
        &self,
        source: &RoundSource,
        participant: &ParticipantId,
        name: &str,
    ) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        guard.join_calls += 1;
        if let Some(err) = guard.join_failures.pop_front() {
            return Err(err);
        }
        let stored = guard.rounds.get(source).ok_or(ApiError::NotFound)?;
        if stored.closed {
            return Err(ApiError::Closed);
        }
        guard.upsert_entry(
            source,
            LeaderboardEntry {
                participant: participant.clone(),
                name: name.to_owned(),
                score: 0,
            },
        );
        Ok(())
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError> {
        let delay = {
            let mut guard = self.lock()?;
            guard.submit_calls += 1;
            guard.submit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut guard = self.lock()?;
        if let Some(err) = guard.submit_failures.pop_front() {
            return Err(err);
        }
        let stored = guard
            .rounds
            .get(&submission.source)
            .ok_or(ApiError::NotFound)?;
        let score = submission
            .answers
            .iter()
            .filter(|(id, answer)| {
                stored
                    .answer_key
                    .get(*id)
                    .is_some_and(|correct| correct == answer.as_str())
            })
            .count();
        let score = u32::try_from(score).unwrap_or(u32::MAX);

        let name = guard
            .board(&submission.source)
            .borrow()
            .entries()
            .iter()
            .find(|e| e.participant == submission.participant)
            .map_or_else(|| submission.participant.to_string(), |e| e.name.clone());
        guard.upsert_entry(
            &submission.source,
            LeaderboardEntry {
                participant: submission.participant.clone(),
                name,
                score,
            },
        );
        guard.submissions.push(submission.clone());
        Ok(SubmitReceipt::accepted(Some(score)))
    }

    async fn leaderboard(&self, source: &RoundSource) -> Result<Leaderboard, ApiError> {
        let mut guard = self.lock()?;
        if !guard.rounds.contains_key(source) {
            return Err(ApiError::NotFound);
        }
        Ok(guard.board(source).borrow().clone())
    }
}

#[async_trait]
impl HostApi for InMemoryApi {
    async fn create_round(&self, draft: &ChallengeDraft) -> Result<RoundId, ApiError> {
        let mut guard = self.lock()?;
        guard.next_id += 1;
        let id = RoundId::new(format!("round-{}", guard.next_id));
        guard.drafts.push(draft.clone());
        Ok(id)
    }

    async fn set_public(&self, source: &RoundSource, public: bool) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let stored = guard.rounds.get_mut(source).ok_or(ApiError::NotFound)?;
        stored.public = public;
        Ok(())
    }

    async fn link_game(&self, source: &RoundSource, game_id: &str) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let stored = guard.rounds.get_mut(source).ok_or(ApiError::NotFound)?;
        stored.game_id = Some(game_id.to_owned());
        Ok(())
    }

    async fn finish(&self, source: &RoundSource) -> Result<Settlement, ApiError> {
        let mut guard = self.lock()?;
        let stored = guard.rounds.get_mut(source).ok_or(ApiError::NotFound)?;
        stored.public = false;
        stored.closed = true;
        let reward = stored.reward_per_score;
        let game_id = stored
            .game_id
            .clone()
            .unwrap_or_else(|| format!("game-{}", source.id));

        let board = guard.board(source).borrow().clone();
        let (participants, rewards): (Vec<_>, Vec<_>) = board
            .entries()
            .iter()
            .map(|e| (e.participant.clone(), reward.saturating_mul(u128::from(e.score))))
            .unzip();
        Ok(Settlement::new(game_id, participants, rewards)?)
    }
}

#[async_trait]
impl PracticeApi for InMemoryApi {
    async fn generate(&self, request: &PracticeRequest) -> Result<PracticeRound, ApiError> {
        request.validate()?;
        let mut guard = self.lock()?;
        guard.practice_requests.push(request.clone());
        let kind = request.game.kind();
        let values = guard.generators.get(&kind).cloned().ok_or(ApiError::NotFound)?;
        let practice = match request.game {
            PracticeGame::Typing { .. } => PracticeRound::typing(request.source(), values)?,
            PracticeGame::Memory => {
                PracticeRound::memory(request.source(), values, request.difficulty)?
            }
        };
        Ok(practice)
    }
}

impl InMemoryApi {
    /// Set the per-score reward used when a round is finished.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the round was never inserted.
    pub fn set_reward_per_score(&self, source: &RoundSource, wei: u128) -> Result<(), ApiError> {
        let mut guard = self.lock()?;
        let stored = guard.rounds.get_mut(source).ok_or(ApiError::NotFound)?;
        stored.reward_per_score = wei;
        Ok(())
    }
}

impl ParticipantSource for InMemoryApi {
    fn subscribe(&self, source: &RoundSource) -> ParticipantStream {
        match self.lock() {
            Ok(mut guard) => ParticipantStream::from_watch(guard.board(source).subscribe()),
            Err(_) => ParticipantStream::closed(),
        }
    }
}

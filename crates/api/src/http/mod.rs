//! reqwest-backed client for the quiz / fact-check backend.

mod wire;

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    ChallengeDraft, DraftContent, Leaderboard, ParticipantId, PracticeGame, PracticeRequest,
    PracticeRound, Round, RoundId, RoundKind, RoundSource, Settlement, Submission,
    SubmitReceipt,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::watch;
use url::Url;

use crate::client::{ApiError, HostApi, PracticeApi, RoundApi};
use crate::feed::{ParticipantSource, ParticipantStream};
use wire::{
    CreatedPayload, ErrorBody, FinishPayload, GameLinkBody, JoinBody, LeaderboardPayload,
    MemoryBody, MemoryPayload, RoundPayload, SubmitPayload, TypingBody, VerifyBody,
    VisibilityBody, WordsPayload,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct ApiConfig {
    base_url: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `ApiError::Config` if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let parsed = Url::parse(base_url.trim())
            .map_err(|e| ApiError::Config(format!("invalid base url {base_url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "unsupported scheme in base url: {}",
                parsed.scheme()
            )));
        }
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Read `QUIZ_API_URL` and `QUIZ_POLL_MS`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` for a malformed URL or poll interval.
    pub fn from_env() -> Result<Self, ApiError> {
        let base = env::var("QUIZ_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let mut config = Self::new(base)?;
        if let Ok(raw) = env::var("QUIZ_POLL_MS") {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("invalid QUIZ_POLL_MS: {raw}")))?;
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, kind: RoundKind, tail: &str) -> String {
        format!("{}/api/{}/{tail}", self.base_url, kind.as_path())
    }
}

#[derive(Clone, Debug)]
pub struct HttpApi {
    client: Client,
    config: ApiConfig,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// # Errors
    ///
    /// Returns `ApiError::Config` for invalid environment configuration.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(ApiConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let response = check_status(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Participant and host routes exist only for backend-hosted kinds.
fn hosted(kind: RoundKind, route: &str) -> Result<(), ApiError> {
    if kind.is_practice() {
        return Err(ApiError::practice_route(kind, route));
    }
    Ok(())
}

/// 404 maps to `NotFound`; other non-2xx statuses carry the `{error|message}` body.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_message);
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RoundApi for HttpApi {
    async fn load_round(
        &self,
        source: &RoundSource,
        participant: &ParticipantId,
    ) -> Result<Round, ApiError> {
        hosted(source.kind, "verify")?;
        let url = self
            .config
            .endpoint(source.kind, &format!("verify/{}", source.id));
        tracing::debug!(%source, "loading round");
        let response = self
            .client
            .post(url)
            .json(&VerifyBody {
                wallet_address: participant.as_str(),
            })
            .send()
            .await?;
        let payload: RoundPayload = Self::decode(response).await?;
        payload.into_round(source)
    }

    async fn join(
        &self,
        source: &RoundSource,
        participant: &ParticipantId,
        name: &str,
    ) -> Result<(), ApiError> {
        hosted(source.kind, "join")?;
        let url = self
            .config
            .endpoint(source.kind, &format!("join/{}", source.id));
        let response = self
            .client
            .post(url)
            .json(&JoinBody {
                wallet_address: participant.as_str(),
                participant_name: name,
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, ApiError> {
        hosted(submission.source.kind, "submit")?;
        let url = self.config.endpoint(submission.source.kind, "submit");
        let body = wire::submit_body(submission)?;
        tracing::info!(
            source = %submission.source,
            answers = submission.answers.len(),
            "submitting answers"
        );
        let response = self.client.post(url).json(&body).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(SubmitReceipt::accepted(None));
        }
        let payload: SubmitPayload =
            serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(payload.into_receipt())
    }

    async fn leaderboard(&self, source: &RoundSource) -> Result<Leaderboard, ApiError> {
        hosted(source.kind, "leaderboard")?;
        let url = self
            .config
            .endpoint(source.kind, &format!("leaderboards/{}", source.id));
        let response = self.client.get(url).send().await?;
        let payload: LeaderboardPayload = Self::decode(response).await?;
        Ok(payload.into_leaderboard())
    }
}

#[async_trait]
impl HostApi for HttpApi {
    async fn create_round(&self, draft: &ChallengeDraft) -> Result<RoundId, ApiError> {
        let total_cost = draft
            .escrow_budget()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        let common = |content_key: &str, content: &str, count_key: &str| {
            json!({
                "creatorName": draft.creator_name,
                content_key: content,
                "numParticipants": draft.participants,
                count_key: draft.item_count,
                "rewardPerScore": draft.reward_per_score.to_string(),
                "creatorWallet": draft.creator.as_str(),
                "totalCost": total_cost.to_string(),
            })
        };
        let (url, body) = match (draft.kind, &draft.content) {
            (RoundKind::Quiz, DraftContent::Topic(prompt)) => (
                self.config.endpoint(RoundKind::Quiz, "create/prompt"),
                common("prompt", prompt.as_str(), "questionCount"),
            ),
            (RoundKind::Quiz, DraftContent::Video(video)) => (
                self.config.endpoint(RoundKind::Quiz, "create/video"),
                common("ytVideoUrl", video.as_str(), "questionCount"),
            ),
            (RoundKind::FactCheck, DraftContent::Topic(topic)) => {
                let mut body = common("topic", topic.as_str(), "factsCount");
                body["difficulty"] = json!(draft.difficulty.as_str());
                (
                    self.config.endpoint(RoundKind::FactCheck, "create/challenge"),
                    body,
                )
            }
            (kind, _) => return Err(ApiError::practice_route(kind, "create")),
        };
        let response = self.client.post(url).json(&body).send().await?;
        let created: CreatedPayload = Self::decode(response).await?;
        created
            .quiz_id
            .or(created.fact_check_id)
            .filter(|id| !id.trim().is_empty())
            .map(RoundId::new)
            .ok_or_else(|| ApiError::Decode("create response carries no round id".into()))
    }

    async fn set_public(&self, source: &RoundSource, public: bool) -> Result<(), ApiError> {
        hosted(source.kind, "update")?;
        let url = self
            .config
            .endpoint(source.kind, &format!("update/{}", source.id));
        let response = self
            .client
            .put(url)
            .json(&VisibilityBody {
                is_public: public,
                is_finished: None,
            })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn link_game(&self, source: &RoundSource, game_id: &str) -> Result<(), ApiError> {
        hosted(source.kind, "update")?;
        let url = self
            .config
            .endpoint(source.kind, &format!("update/{}", source.id));
        tracing::info!(%source, game_id, "linking escrow game");
        let response = self
            .client
            .put(url)
            .json(&GameLinkBody { game_id })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn finish(&self, source: &RoundSource) -> Result<Settlement, ApiError> {
        hosted(source.kind, "update")?;
        let url = self
            .config
            .endpoint(source.kind, &format!("update/{}", source.id));
        let response = self
            .client
            .put(url)
            .json(&VisibilityBody {
                is_public: false,
                is_finished: Some(true),
            })
            .send()
            .await?;
        let payload: FinishPayload = Self::decode(response).await?;
        payload.into_settlement()
    }
}

#[async_trait]
impl PracticeApi for HttpApi {
    async fn generate(&self, request: &PracticeRequest) -> Result<PracticeRound, ApiError> {
        request.validate()?;
        let difficulty = request.difficulty.as_str();
        tracing::debug!(kind = %request.game.kind(), difficulty, "generating practice round");
        let practice = match &request.game {
            PracticeGame::Typing { category } => {
                let url = self.config.endpoint(RoundKind::Typing, "words");
                let response = self
                    .client
                    .post(url)
                    .json(&TypingBody {
                        difficulty,
                        category: category.trim(),
                    })
                    .send()
                    .await?;
                let payload: WordsPayload = Self::decode(response).await?;
                PracticeRound::typing(request.source(), payload.words)?
            }
            PracticeGame::Memory => {
                let url = self.config.endpoint(RoundKind::Memory, "challenge");
                let response = self
                    .client
                    .post(url)
                    .json(&MemoryBody { difficulty })
                    .send()
                    .await?;
                let payload: MemoryPayload = Self::decode(response).await?;
                PracticeRound::memory(
                    request.source(),
                    payload.into_sequence(),
                    request.difficulty,
                )?
            }
        };
        Ok(practice)
    }
}

impl ParticipantSource for HttpApi {
    /// Polls the leaderboard endpoint every `poll_interval`; only changed lists are published.
    fn subscribe(&self, source: &RoundSource) -> ParticipantStream {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%source, "no async runtime, participant feed disabled");
            return ParticipantStream::closed();
        };
        let (tx, rx) = watch::channel(Leaderboard::default());
        let api = self.clone();
        let source = source.clone();
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(api.config.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }
                match api.leaderboard(&source).await {
                    Ok(board) => {
                        tx.send_if_modified(|current| {
                            if *current == board {
                                false
                            } else {
                                *current = board;
                                true
                            }
                        });
                    }
                    Err(err) => tracing::warn!(%source, error = %err, "leaderboard poll failed"),
                }
            }
        });
        ParticipantStream::polling(rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_garbage_urls() {
        assert!(matches!(ApiConfig::new("not a url"), Err(ApiError::Config(_))));
        assert!(matches!(
            ApiConfig::new("ftp://example.com"),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn endpoints_follow_kind_paths() {
        let config = ApiConfig::new("http://localhost:5000/").unwrap();
        assert_eq!(
            config.endpoint(RoundKind::FactCheck, "verify/abc"),
            "http://localhost:5000/api/fact-check/verify/abc"
        );
        assert_eq!(
            config.endpoint(RoundKind::Quiz, "submit"),
            "http://localhost:5000/api/quiz/submit"
        );
        assert_eq!(
            config.endpoint(RoundKind::Memory, "challenge"),
            "http://localhost:5000/api/memory-challenge/challenge"
        );
    }

    #[test]
    fn practice_kinds_have_no_participant_routes() {
        assert!(hosted(RoundKind::FactCheck, "join").is_ok());
        assert!(matches!(
            hosted(RoundKind::Typing, "join"),
            Err(ApiError::Unsupported(_))
        ));
    }
}

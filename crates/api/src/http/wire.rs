//! JSON shapes spoken by the quiz / fact-check backend and their mapping to domain types.

use quiz_core::model::{
    Item, ItemId, Leaderboard, LeaderboardEntry, ParticipantId, Round, RoundKind, RoundSource,
    Settlement, Submission, SubmitReceipt, DEFAULT_ITEM_SECONDS,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::ApiError;

fn decode<E: core::fmt::Display>(e: E) -> ApiError {
    ApiError::Decode(e.to_string())
}

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VerifyBody<'a> {
    pub wallet_address: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinBody<'a> {
    pub wallet_address: &'a str,
    pub participant_name: &'a str,
}

/// Submission body; the round id field name depends on the round kind.
pub(crate) fn submit_body(submission: &Submission) -> Result<Value, ApiError> {
    let mut body = Map::new();
    body.insert(
        submission.source.kind.id_field().to_owned(),
        Value::String(submission.source.id.to_string()),
    );
    body.insert(
        "walletAddress".to_owned(),
        Value::String(submission.participant.to_string()),
    );
    body.insert(
        "answers".to_owned(),
        serde_json::to_value(&submission.answers).map_err(decode)?,
    );
    Ok(Value::Object(body))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VisibilityBody {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_finished: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GameLinkBody<'a> {
    pub game_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TypingBody<'a> {
    pub difficulty: &'a str,
    pub category: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct MemoryBody<'a> {
    pub difficulty: &'a str,
}

//
// ─── RESPONSES ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemPayload {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "statement", alias = "question")]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoundPayload {
    #[serde(alias = "facts", alias = "questions")]
    pub items: Vec<ItemPayload>,
    #[serde(default)]
    pub per_item_seconds: Option<u32>,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub creator_name: Option<String>,
}

impl RoundPayload {
    /// Validate into a domain round. Fact-check items without options become true/false.
    pub(crate) fn into_round(self, source: &RoundSource) -> Result<Round, ApiError> {
        if self.is_finished {
            return Err(ApiError::Closed);
        }
        let items = self
            .items
            .into_iter()
            .map(|raw| {
                let id = ItemId::new(raw.id);
                if raw.options.is_empty() && source.kind == RoundKind::FactCheck {
                    Item::true_false(id, raw.prompt)
                } else {
                    Item::new(id, raw.prompt, raw.options)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let round = Round::new(
            source.clone(),
            items,
            self.per_item_seconds.unwrap_or(DEFAULT_ITEM_SECONDS),
        )?;
        let title = self.topic.or(self.creator_name).unwrap_or_default();
        Ok(round.with_title(title))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitPayload {
    #[serde(default)]
    pub accepted: Option<bool>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl SubmitPayload {
    /// A 2xx response without an explicit `accepted` flag counts as accepted.
    pub(crate) fn into_receipt(self) -> SubmitReceipt {
        SubmitReceipt {
            accepted: self.accepted.unwrap_or(true),
            score: self.score.map(score_to_u32),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParticipantPayload {
    pub wallet_address: String,
    #[serde(default)]
    pub participant_name: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardPayload {
    #[serde(default)]
    pub participants: Vec<ParticipantPayload>,
}

impl LeaderboardPayload {
    pub(crate) fn into_leaderboard(self) -> Leaderboard {
        Leaderboard::new(
            self.participants
                .into_iter()
                .map(|p| LeaderboardEntry {
                    participant: ParticipantId::new(p.wallet_address),
                    name: p.participant_name,
                    score: score_to_u32(p.score),
                })
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedPayload {
    pub quiz_id: Option<String>,
    pub fact_check_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FinishPayload {
    pub game_id: Option<Value>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub rewards: Vec<Value>,
}

impl FinishPayload {
    pub(crate) fn into_settlement(self) -> Result<Settlement, ApiError> {
        let game_id = match self.game_id {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let rewards = self
            .rewards
            .iter()
            .map(parse_wei)
            .collect::<Result<Vec<_>, _>>()?;
        let participants = self
            .participants
            .into_iter()
            .map(ParticipantId::new)
            .collect();
        Ok(Settlement::new(game_id, participants, rewards)?)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn score_to_u32(score: f64) -> u32 {
    if score.is_finite() && score > 0.0 {
        score.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WordsPayload {
    pub words: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemoryChallenge {
    #[serde(default)]
    pub sequence: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemoryPayload {
    pub challenge: MemoryChallenge,
}

impl MemoryPayload {
    /// Sequence elements come back as strings, numbers or emoji; all are compared as text.
    pub(crate) fn into_sequence(self) -> Vec<String> {
        self.challenge
            .sequence
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()
    }
}

/// Wei amounts arrive either as decimal strings or as JSON numbers.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_wei(value: &Value) -> Result<u128, ApiError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<u128>()
            .map_err(|_| ApiError::Decode(format!("invalid wei amount: {s}"))),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(u128::from(v));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u128),
                _ => Err(ApiError::Decode(format!("invalid wei amount: {n}"))),
            }
        }
        other => Err(ApiError::Decode(format!("invalid wei amount: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Answer, AnswerSet, RoundId};
    use serde_json::json;

    fn fact_source() -> RoundSource {
        RoundSource::new(RoundKind::FactCheck, RoundId::new("fc1"))
    }

    #[test]
    fn fact_check_payload_maps_ids_and_defaults_options() {
        let payload: RoundPayload = serde_json::from_value(json!({
            "_id": "fc1",
            "facts": [
                { "_id": "a", "statement": "The moon is made of rock" },
                { "_id": "b", "statement": "Mars has two moons" }
            ],
            "isPublic": true,
            "isFinished": false,
            "creatorName": "host"
        }))
        .unwrap();

        let round = payload.into_round(&fact_source()).unwrap();
        assert_eq!(round.len(), 2);
        assert_eq!(round.per_item_seconds(), DEFAULT_ITEM_SECONDS);
        assert_eq!(round.items()[0].options(), ["true", "false"]);
        assert_eq!(round.title(), Some("host"));
    }

    #[test]
    fn finished_round_is_closed() {
        let payload: RoundPayload = serde_json::from_value(json!({
            "facts": [{ "_id": "a", "statement": "x" }],
            "isFinished": true
        }))
        .unwrap();
        assert_eq!(
            payload.into_round(&fact_source()).unwrap_err(),
            ApiError::Closed
        );
    }

    #[test]
    fn empty_round_is_a_validation_error() {
        let payload: RoundPayload = serde_json::from_value(json!({ "items": [] })).unwrap();
        assert!(matches!(
            payload.into_round(&fact_source()),
            Err(ApiError::InvalidRound(_))
        ));
    }

    #[test]
    fn submit_body_uses_kind_specific_id_field() {
        let answers: AnswerSet = [(ItemId::new("a"), Answer::NoAnswer)].into_iter().collect();
        let body = submit_body(&Submission {
            source: fact_source(),
            participant: ParticipantId::new("0xabc"),
            answers,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "factCheckId": "fc1",
                "walletAddress": "0xabc",
                "answers": { "a": "no_answer" }
            })
        );
    }

    #[test]
    fn settlement_accepts_string_and_number_rewards() {
        let payload: FinishPayload = serde_json::from_value(json!({
            "gameId": 7,
            "participants": ["0x1", "0x2"],
            "rewards": ["2000000000000000000", 5]
        }))
        .unwrap();
        let settlement = payload.into_settlement().unwrap();
        assert_eq!(settlement.game_id(), "7");
        assert_eq!(settlement.payouts()[0].1, 2_000_000_000_000_000_000);
        assert_eq!(settlement.payouts()[1].1, 5);
    }

    #[test]
    fn missing_accepted_flag_means_accepted() {
        let payload: SubmitPayload = serde_json::from_value(json!({ "score": 3 })).unwrap();
        assert_eq!(payload.into_receipt(), SubmitReceipt::accepted(Some(3)));
    }

    #[test]
    fn memory_sequence_mixes_numbers_and_text() {
        let payload: MemoryPayload = serde_json::from_value(json!({
            "challenge": { "sequence": [3, "🍎", 7.5], "difficulty": "easy" }
        }))
        .unwrap();
        assert_eq!(payload.into_sequence(), ["3", "🍎", "7.5"]);
    }
}

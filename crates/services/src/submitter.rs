use std::fmt;
use std::sync::Arc;

use quiz_api::{ApiError, RoundApi};
use quiz_core::model::{Submission, SubmitReceipt};
use tokio::task::JoinHandle;

use crate::error::SubmissionError;

/// Identifies one submission attempt. Later attempts get larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionToken(u64);

impl SubmissionToken {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubmissionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type SubmissionOutcome = (SubmissionToken, Result<SubmitReceipt, SubmissionError>);

/// Sends the final answer set, one network call at a time. Never retries on its own.
pub struct ResultSubmitter {
    api: Arc<dyn RoundApi>,
    issued: u64,
    in_flight: Option<(SubmissionToken, JoinHandle<Result<SubmitReceipt, ApiError>>)>,
}

impl ResultSubmitter {
    #[must_use]
    pub fn new(api: Arc<dyn RoundApi>) -> Self {
        Self {
            api,
            issued: 0,
            in_flight: None,
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn in_flight_token(&self) -> Option<SubmissionToken> {
        self.in_flight.as_ref().map(|(token, _)| *token)
    }

    /// Spawn the submit call.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::InFlight` while a previous call is still pending.
    pub fn begin(&mut self, submission: Submission) -> Result<SubmissionToken, SubmissionError> {
        if self.in_flight.is_some() {
            return Err(SubmissionError::InFlight);
        }
        self.issued += 1;
        let token = SubmissionToken(self.issued);
        let api = Arc::clone(&self.api);
        let handle = tokio::spawn(async move { api.submit(&submission).await });
        tracing::debug!(%token, "submission started");
        self.in_flight = Some((token, handle));
        Ok(token)
    }

    /// Wait for the in-flight call. Returns `None` when nothing is pending.
    ///
    /// Cancel safe: dropping the future keeps the call in flight.
    pub async fn wait(&mut self) -> Option<SubmissionOutcome> {
        let (token, handle) = self.in_flight.as_mut()?;
        let token = *token;
        let joined = handle.await;
        self.in_flight = None;

        let result = match joined {
            Ok(Ok(receipt)) if receipt.accepted => Ok(receipt),
            Ok(Ok(_)) => Err(SubmissionError::Rejected),
            Ok(Err(err)) => Err(SubmissionError::Api(err)),
            Err(join) => Err(SubmissionError::Interrupted(join.to_string())),
        };
        Some((token, result))
    }

    /// Begin and wait in one call.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the call is refused, rejected or fails.
    pub async fn submit(&mut self, submission: Submission) -> Result<SubmitReceipt, SubmissionError> {
        self.begin(submission)?;
        match self.wait().await {
            Some((_, result)) => result,
            None => Err(SubmissionError::Interrupted("submission vanished".into())),
        }
    }

    /// Forget the in-flight call. A request already sent is not aborted; its result is dropped.
    pub fn discard(&mut self) -> Option<SubmissionToken> {
        self.in_flight.take().map(|(token, _handle)| token)
    }
}

impl fmt::Debug for ResultSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSubmitter")
            .field("issued", &self.issued)
            .field("in_flight", &self.in_flight_token())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_api::InMemoryApi;
    use quiz_core::model::{AnswerSet, Item, ItemId, ParticipantId, Round, RoundId, RoundKind, RoundSource};
    use std::time::Duration;

    fn source() -> RoundSource {
        RoundSource::new(RoundKind::Quiz, RoundId::new("q1"))
    }

    fn api() -> InMemoryApi {
        let api = InMemoryApi::new();
        let item = Item::new(ItemId::new("1"), "pick", vec!["a".into(), "b".into()]).unwrap();
        api.insert_round(Round::new(source(), vec![item], 30).unwrap())
            .unwrap();
        api
    }

    fn submission() -> Submission {
        Submission {
            source: source(),
            participant: ParticipantId::new("0x1"),
            answers: AnswerSet::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_begin_while_in_flight_is_refused() {
        let api = api();
        api.set_submit_delay(Duration::from_secs(2)).unwrap();
        let mut submitter = ResultSubmitter::new(Arc::new(api.clone()));

        let first = submitter.begin(submission()).unwrap();
        assert_eq!(
            submitter.begin(submission()),
            Err(SubmissionError::InFlight)
        );

        let (token, result) = submitter.wait().await.unwrap();
        assert_eq!(token, first);
        assert!(result.is_ok());
        assert_eq!(api.submit_calls(), 1);
        assert!(submitter.wait().await.is_none());
    }

    #[tokio::test]
    async fn tokens_increase_across_attempts() {
        let api = api();
        api.fail_next_submit(ApiError::Transport("offline".into()))
            .unwrap();
        let mut submitter = ResultSubmitter::new(Arc::new(api));

        let first = submitter.begin(submission()).unwrap();
        let (_, failed) = submitter.wait().await.unwrap();
        assert!(matches!(failed, Err(SubmissionError::Api(_))));

        let second = submitter.begin(submission()).unwrap();
        assert!(second > first);
        assert!(submitter.wait().await.unwrap().1.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn discarded_call_still_reaches_backend() {
        let api = api();
        api.set_submit_delay(Duration::from_secs(1)).unwrap();
        let mut submitter = ResultSubmitter::new(Arc::new(api.clone()));

        let token = submitter.begin(submission()).unwrap();
        assert_eq!(submitter.discard(), Some(token));
        assert!(submitter.wait().await.is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.submissions().len(), 1);
    }
}

//! Single owner of one participant's round: machine state, countdown and submission.
//!
//! Renderers read `current_snapshot()` and forward user input as commands; time and
//! network completions arrive through `next_event()`.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quiz_api::RoundApi;
use quiz_core::machine::MachineError;
use quiz_core::model::{ItemId, Round, RoundSource, RoundSummary, Submission, SubmitReceipt};
use quiz_core::{Clock, Phase, RoundMachine, RoundSnapshot, Selection, Step};

use crate::clock::{ClockEvent, DEFAULT_TICK_PERIOD, RoundClock};
use crate::error::{ControllerError, LoadError, SubmissionError, ValidationError};
use crate::identity::WalletIdentity;
use crate::submitter::{ResultSubmitter, SubmissionToken};

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Wall time of one countdown second.
    pub tick_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
        }
    }
}

impl ControllerConfig {
    /// Read `QUIZ_TICK_MS`; unset or unparsable values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var("QUIZ_TICK_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.tick_period = Duration::from_millis(ms),
                _ => tracing::warn!(value = %raw, "ignoring invalid QUIZ_TICK_MS"),
            }
        }
        config
    }
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Result of `next()` or of an expired item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved { index: usize },
    Submitting(SubmissionToken),
    Ignored,
}

/// Something the renderer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    Tick { remaining: u32 },
    TimedOut(Advance),
    Finished(RoundSummary),
    SubmissionFailed(SubmissionError),
    Aborted { reason: String },
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

pub struct RoundController {
    api: Arc<dyn RoundApi>,
    identity: WalletIdentity,
    wall: Clock,
    machine: RoundMachine,
    clock: RoundClock,
    submitter: ResultSubmitter,
    source: Option<RoundSource>,
    started_at: Option<DateTime<Utc>>,
    pending: Option<SubmissionToken>,
    summary: Option<RoundSummary>,
}

impl RoundController {
    #[must_use]
    pub fn new(
        api: Arc<dyn RoundApi>,
        identity: WalletIdentity,
        wall: Clock,
        config: ControllerConfig,
    ) -> Self {
        Self {
            submitter: ResultSubmitter::new(Arc::clone(&api)),
            api,
            identity,
            wall,
            machine: RoundMachine::new(),
            clock: RoundClock::new(config.tick_period),
            source: None,
            started_at: None,
            pending: None,
            summary: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    #[must_use]
    pub fn round(&self) -> Option<&Round> {
        self.machine.round()
    }

    /// Item transitions so far, user-driven and timed out alike.
    #[must_use]
    pub fn advances(&self) -> usize {
        self.machine.advances()
    }

    #[must_use]
    pub fn identity(&self) -> &WalletIdentity {
        &self.identity
    }

    /// Summary of the finished round, once the submission was acknowledged.
    #[must_use]
    pub fn summary(&self) -> Option<&RoundSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn current_snapshot(&self) -> RoundSnapshot {
        self.machine.snapshot()
    }

    /// Fetch and validate the round.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Load` on any fetch or validation failure; the controller
    /// stays `Idle`. Returns `ControllerError::Machine` if a round is already loaded.
    pub async fn load_round(&mut self, source: RoundSource) -> Result<&Round, ControllerError> {
        self.expect_phase(Phase::Idle)?;
        let round = self
            .api
            .load_round(&source, self.identity.participant())
            .await
            .map_err(LoadError::from)
            .inspect_err(|err| tracing::warn!(%source, error = %err, "round load failed"))?;

        tracing::info!(%source, items = round.len(), "round loaded");
        self.machine.load(round)?;
        self.source = Some(source);
        self.machine.round().ok_or(ControllerError::Load(LoadError::Empty))
    }

    /// Register under `name` and start the first item.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyName` for a blank name without calling the backend,
    /// or `ControllerError::Join` if the backend refuses; either way the phase is unchanged.
    pub async fn join(&mut self, name: &str) -> Result<(), ControllerError> {
        self.expect_phase(Phase::WaitingToJoin)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let source = self.loaded_source()?;
        self.api
            .join(&source, self.identity.participant(), name)
            .await
            .map_err(ControllerError::Join)?;

        self.machine.join(name)?;
        self.started_at = Some(self.wall.now());
        self.clock.start(self.per_item_seconds());
        tracing::info!(%source, participant = %self.identity.participant(), "joined round");
        Ok(())
    }

    /// Record a choice for the current item. Late or stray selections are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownOption` if the item does not offer `value`.
    pub fn select_answer(
        &mut self,
        item_id: &ItemId,
        value: &str,
    ) -> Result<Selection, ControllerError> {
        Ok(self.machine.answer(item_id, value)?)
    }

    /// Leave the current item. Past the last item this starts the one submission.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Submission` if the submission could not be started.
    pub fn next(&mut self) -> Result<Advance, ControllerError> {
        let step = self.machine.advance();
        Ok(self.apply_step(step)?)
    }

    /// Wait for the next clock or submission event.
    ///
    /// Returns `None` when no countdown is running and no submission is pending.
    pub async fn next_event(&mut self) -> Option<RoundEvent> {
        loop {
            tokio::select! {
                Some(event) = self.clock.recv() => {
                    if let Some(out) = self.on_clock(event) {
                        return Some(out);
                    }
                }
                Some((token, result)) = self.submitter.wait() => {
                    if let Some(out) = self.on_submission(token, result) {
                        return Some(out);
                    }
                }
                else => return None,
            }
        }
    }

    /// Abort the round. Pending timers stop and a pending submission result is dropped.
    pub fn abort(&mut self, reason: &str) -> bool {
        self.stop_effects();
        let aborted = self.machine.fail(reason);
        if aborted {
            tracing::warn!(reason, "round aborted");
        }
        aborted
    }

    /// Stop the countdown and forget any pending submission. A request already sent
    /// still completes on the backend.
    pub fn shutdown(&mut self) {
        self.stop_effects();
        tracing::debug!("controller shut down");
    }

    fn stop_effects(&mut self) {
        self.clock.cancel();
        if let Some(token) = self.submitter.discard() {
            tracing::debug!(%token, "discarding in-flight submission");
        }
        self.pending = None;
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), ControllerError> {
        let actual = self.machine.phase();
        if actual == expected {
            Ok(())
        } else {
            Err(ControllerError::Machine(MachineError::InvalidPhase {
                expected,
                actual,
            }))
        }
    }

    fn loaded_source(&self) -> Result<RoundSource, ControllerError> {
        self.source.clone().ok_or(ControllerError::Machine(MachineError::InvalidPhase {
            expected: Phase::WaitingToJoin,
            actual: self.machine.phase(),
        }))
    }

    fn per_item_seconds(&self) -> u32 {
        self.machine.round().map_or(0, Round::per_item_seconds)
    }

    fn apply_step(&mut self, step: Step) -> Result<Advance, SubmissionError> {
        match step {
            Step::Moved { index } => {
                self.clock.reset(self.per_item_seconds());
                Ok(Advance::Moved { index })
            }
            Step::Exhausted => {
                self.clock.cancel();
                self.begin_submission().map(Advance::Submitting)
            }
            Step::Ignored => Ok(Advance::Ignored),
        }
    }

    fn begin_submission(&mut self) -> Result<SubmissionToken, SubmissionError> {
        let Some(source) = self.source.clone() else {
            return Err(SubmissionError::Interrupted("no round loaded".into()));
        };
        let submission = Submission {
            source,
            participant: self.identity.participant().clone(),
            answers: self.machine.answers().clone(),
        };
        match self.submitter.begin(submission) {
            Ok(token) => {
                tracing::info!(%token, answers = self.machine.answers().len(), "submitting round");
                self.pending = Some(token);
                Ok(token)
            }
            Err(err) => {
                let _ = self.machine.submit_failed();
                Err(err)
            }
        }
    }

    fn on_clock(&mut self, event: ClockEvent) -> Option<RoundEvent> {
        match event {
            ClockEvent::Tick { remaining } => match self.machine.tick(i64::from(remaining)) {
                Ok(()) => Some(RoundEvent::Tick { remaining }),
                Err(desync) => {
                    tracing::warn!(
                        reported = desync.reported,
                        budget = desync.budget,
                        "timer out of sync, expiring item"
                    );
                    self.expire_current()
                }
            },
            ClockEvent::Expired => self.expire_current(),
        }
    }

    fn expire_current(&mut self) -> Option<RoundEvent> {
        let step = self.machine.expire();
        if step == Step::Ignored {
            return None;
        }
        tracing::debug!(index = self.machine.current_index(), "item timed out");
        match self.apply_step(step) {
            Ok(advance) => Some(RoundEvent::TimedOut(advance)),
            Err(err) => Some(RoundEvent::SubmissionFailed(err)),
        }
    }

    fn on_submission(
        &mut self,
        token: SubmissionToken,
        result: Result<SubmitReceipt, SubmissionError>,
    ) -> Option<RoundEvent> {
        if self.pending != Some(token) {
            tracing::debug!(%token, "dropping stale submission result");
            return None;
        }
        self.pending = None;

        match result {
            Ok(receipt) => match self.build_summary(receipt) {
                Ok(summary) => {
                    if let Err(err) = self.machine.submit_ack() {
                        tracing::warn!(error = %err, "submission acknowledged out of phase");
                        return None;
                    }
                    tracing::info!(%token, score = ?summary.score(), "round finished");
                    self.summary = Some(summary.clone());
                    Some(RoundEvent::Finished(summary))
                }
                Err(err) => {
                    let reason = err.to_string();
                    tracing::error!(error = %reason, "could not summarise round");
                    self.machine.fail(reason.clone());
                    Some(RoundEvent::Aborted { reason })
                }
            },
            Err(err) => {
                tracing::warn!(%token, error = %err, "submission failed");
                let _ = self.machine.submit_failed();
                Some(RoundEvent::SubmissionFailed(err))
            }
        }
    }

    fn build_summary(&self, receipt: SubmitReceipt) -> Result<RoundSummary, ControllerError> {
        let source = self.loaded_source()?;
        let now = self.wall.now();
        let started_at = self.started_at.unwrap_or(now);
        let summary = RoundSummary::from_answers(
            source,
            self.identity.participant().clone(),
            self.machine.round().map_or(0, Round::len),
            self.machine.answers(),
            started_at,
            now.max(started_at),
        )?;
        Ok(summary.with_score(receipt.score))
    }
}

impl std::fmt::Debug for RoundController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundController")
            .field("phase", &self.machine.phase())
            .field("source", &self.source)
            .field("clock", &self.clock)
            .field("submitter", &self.submitter)
            .finish_non_exhaustive()
    }
}

//! Round state machine: current item, answers, remaining time, and phase.
//!
//! Pure and synchronous; timing and network effects are driven from the services layer.

use std::fmt;

use thiserror::Error;

use crate::model::{Answer, AnswerSet, Item, ItemId, Round};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MachineError {
    #[error("expected phase {expected}, found {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("participant name cannot be empty")]
    EmptyName,

    #[error("{value:?} is not an option for item {item}")]
    UnknownOption { item: ItemId, value: String },
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle stage of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// Round not yet loaded.
    #[default]
    Idle,
    /// Round loaded, participant name not captured yet.
    WaitingToJoin,
    /// Exactly one item is current and its countdown runs.
    Active,
    /// Every item answered or timed out; the result payload is in flight.
    Submitting,
    /// Submission acknowledged. Nothing changes after this.
    Finished,
    /// Terminal failure.
    Aborted,
}

impl Phase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Aborted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::WaitingToJoin => "waiting-to-join",
            Phase::Active => "active",
            Phase::Submitting => "submitting",
            Phase::Finished => "finished",
            Phase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of an `advance`/`expire` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A new item is current.
    Moved { index: usize },
    /// The last item was passed; phase is now `Submitting`.
    Exhausted,
    /// Not in `Active`; nothing changed.
    Ignored,
}

/// Result of an `answer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Recorded,
    /// Stale or out-of-phase input, dropped without touching the answer set.
    Ignored,
}

/// Remaining-time report that cannot come from a healthy countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDesync {
    pub reported: i64,
    pub budget: u32,
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Immutable view handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub phase: Phase,
    pub current_index: usize,
    pub total: usize,
    pub remaining_seconds: u32,
    pub current_item: Option<Item>,
    pub answers: AnswerSet,
    pub participant_name: Option<String>,
}

impl RoundSnapshot {
    /// Answer currently recorded for the current item, if any.
    #[must_use]
    pub fn current_answer(&self) -> Option<&Answer> {
        self.current_item
            .as_ref()
            .and_then(|item| self.answers.get(item.id()))
    }
}

//
// ─── MACHINE ───────────────────────────────────────────────────────────────────
//

/// Session aggregate for one participant's round.
#[derive(Debug, Clone, Default)]
pub struct RoundMachine {
    round: Option<Round>,
    phase: Phase,
    current: usize,
    remaining_seconds: u32,
    answers: AnswerSet,
    participant_name: Option<String>,
    advances: usize,
    /// Set after a failed submission; the final item is closed and only `advance` applies.
    retrying: bool,
    abort_reason: Option<String>,
}

impl RoundMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_item(&self) -> Option<&Item> {
        match self.phase {
            Phase::Active | Phase::Submitting => self.round.as_ref()?.item(self.current),
            _ => None,
        }
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    #[must_use]
    pub fn participant_name(&self) -> Option<&str> {
        self.participant_name.as_deref()
    }

    /// Number of advance/expire events applied so far.
    #[must_use]
    pub fn advances(&self) -> usize {
        self.advances
    }

    /// True while a failed submission waits for a manual retry.
    #[must_use]
    pub fn is_retrying(&self) -> bool {
        self.retrying
    }

    #[must_use]
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), MachineError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(MachineError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn per_item_seconds(&self) -> u32 {
        self.round.as_ref().map_or(0, Round::per_item_seconds)
    }

    /// `Idle → WaitingToJoin`.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidPhase` unless the machine is `Idle`.
    pub fn load(&mut self, round: Round) -> Result<(), MachineError> {
        self.expect_phase(Phase::Idle)?;
        self.remaining_seconds = round.per_item_seconds();
        self.round = Some(round);
        self.phase = Phase::WaitingToJoin;
        Ok(())
    }

    /// `WaitingToJoin → Active`, making item 0 current.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::EmptyName` for a blank name (no state change), or
    /// `MachineError::InvalidPhase` outside `WaitingToJoin`.
    pub fn join(&mut self, name: &str) -> Result<(), MachineError> {
        self.expect_phase(Phase::WaitingToJoin)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(MachineError::EmptyName);
        }
        self.participant_name = Some(name.to_owned());
        self.current = 0;
        self.remaining_seconds = self.per_item_seconds();
        self.phase = Phase::Active;
        Ok(())
    }

    /// Record `value` for `item_id` if it is the current item of an active round.
    ///
    /// Re-selecting replaces the current item's choice.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::UnknownOption` if the current item does not offer `value`.
    pub fn answer(&mut self, item_id: &ItemId, value: &str) -> Result<Selection, MachineError> {
        if self.phase != Phase::Active || self.retrying {
            return Ok(Selection::Ignored);
        }
        let Some(item) = self.current_item() else {
            return Ok(Selection::Ignored);
        };
        if item.id() != item_id {
            return Ok(Selection::Ignored);
        }
        if !item.accepts(value) {
            return Err(MachineError::UnknownOption {
                item: item_id.clone(),
                value: value.to_owned(),
            });
        }
        self.answers
            .record(item_id.clone(), Answer::choice(value.to_owned()));
        Ok(Selection::Recorded)
    }

    /// Close the current item and move on.
    ///
    /// Writes `no_answer` for an unanswered item. Past the last item the phase becomes
    /// `Submitting` and the index stays on the last item.
    pub fn advance(&mut self) -> Step {
        if self.phase != Phase::Active {
            return Step::Ignored;
        }
        let Some(round) = self.round.as_ref() else {
            return Step::Ignored;
        };
        let Some(item) = round.item(self.current) else {
            return Step::Ignored;
        };

        self.answers.record_missing(item.id());
        self.advances += 1;

        let next = self.current + 1;
        if next < round.len() {
            self.current = next;
            self.remaining_seconds = round.per_item_seconds();
            Step::Moved { index: next }
        } else {
            self.remaining_seconds = 0;
            self.retrying = false;
            self.phase = Phase::Submitting;
            Step::Exhausted
        }
    }

    /// Countdown reached zero for the current item. Same transition as `advance`.
    pub fn expire(&mut self) -> Step {
        self.advance()
    }

    /// Apply a countdown report for the current item.
    ///
    /// # Errors
    ///
    /// Returns `TimerDesync` if `remaining` is negative or above the item budget; the
    /// caller should expire the item. Out-of-phase ticks, and ticks while a failed
    /// submission awaits retry, are ignored.
    pub fn tick(&mut self, remaining: i64) -> Result<(), TimerDesync> {
        if self.phase != Phase::Active || self.retrying {
            return Ok(());
        }
        let budget = self.per_item_seconds();
        match u32::try_from(remaining) {
            Ok(value) if value <= budget => {
                self.remaining_seconds = value;
                Ok(())
            }
            _ => Err(TimerDesync {
                reported: remaining,
                budget,
            }),
        }
    }

    /// `Submitting → Finished`.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidPhase` outside `Submitting`.
    pub fn submit_ack(&mut self) -> Result<(), MachineError> {
        self.expect_phase(Phase::Submitting)?;
        self.phase = Phase::Finished;
        Ok(())
    }

    /// `Submitting → Active` on the final item so the participant can retry.
    ///
    /// The final item stays closed: selections are ignored until the next `advance`
    /// resubmits. The answer set is left untouched and no time remains on the item.
    ///
    /// # Errors
    ///
    /// Returns `MachineError::InvalidPhase` outside `Submitting`.
    pub fn submit_failed(&mut self) -> Result<(), MachineError> {
        self.expect_phase(Phase::Submitting)?;
        self.remaining_seconds = 0;
        self.retrying = true;
        self.phase = Phase::Active;
        Ok(())
    }

    /// Move to `Aborted` from any non-`Finished` phase. Returns false if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.abort_reason = Some(reason.into());
        self.phase = Phase::Aborted;
        true
    }

    #[must_use]
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            phase: self.phase,
            current_index: self.current,
            total: self.round.as_ref().map_or(0, Round::len),
            remaining_seconds: self.remaining_seconds,
            current_item: self.current_item().cloned(),
            answers: self.answers.clone(),
            participant_name: self.participant_name.clone(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RoundId, RoundKind, RoundSource};

    fn round(n: usize) -> Round {
        let items = (1..=n)
            .map(|i| Item::true_false(ItemId::new(format!("item{i}")), format!("fact {i}")).unwrap())
            .collect();
        Round::new(
            RoundSource::new(RoundKind::FactCheck, RoundId::new("fc")),
            items,
            30,
        )
        .unwrap()
    }

    fn active(n: usize) -> RoundMachine {
        let mut m = RoundMachine::new();
        m.load(round(n)).unwrap();
        m.join("ada").unwrap();
        m
    }

    #[test]
    fn join_requires_name_and_keeps_phase() {
        let mut m = RoundMachine::new();
        m.load(round(2)).unwrap();
        assert_eq!(m.join("   "), Err(MachineError::EmptyName));
        assert_eq!(m.phase(), Phase::WaitingToJoin);

        m.join("  ada ").unwrap();
        assert_eq!(m.phase(), Phase::Active);
        assert_eq!(m.participant_name(), Some("ada"));
        assert_eq!(m.remaining_seconds(), 30);
    }

    #[test]
    fn join_before_load_is_invalid() {
        let mut m = RoundMachine::new();
        assert!(matches!(
            m.join("ada"),
            Err(MachineError::InvalidPhase {
                expected: Phase::WaitingToJoin,
                actual: Phase::Idle
            })
        ));
    }

    #[test]
    fn n_advances_reach_submitting() {
        for n in 1..=5 {
            let mut m = active(n);
            let mut moves = 0;
            loop {
                let step = if moves % 2 == 0 { m.advance() } else { m.expire() };
                match step {
                    Step::Moved { .. } => moves += 1,
                    Step::Exhausted => {
                        moves += 1;
                        break;
                    }
                    Step::Ignored => panic!("active machine ignored advance"),
                }
            }
            assert_eq!(moves, n);
            assert_eq!(m.advances(), n);
            assert_eq!(m.phase(), Phase::Submitting);
            assert_eq!(m.answers().len(), n);
            assert_eq!(m.current_index(), n - 1);
        }
    }

    #[test]
    fn answer_for_non_current_item_is_ignored() {
        let mut m = active(3);
        let before = m.answers().clone();
        let got = m.answer(&ItemId::new("item2"), "true").unwrap();
        assert_eq!(got, Selection::Ignored);
        assert_eq!(m.answers(), &before);
    }

    #[test]
    fn stale_answer_after_expiry_does_not_leak() {
        let mut m = active(2);
        assert_eq!(m.expire(), Step::Moved { index: 1 });
        assert_eq!(
            m.answers().get(&ItemId::new("item1")),
            Some(&Answer::NoAnswer)
        );
        assert_eq!(
            m.answer(&ItemId::new("item1"), "true").unwrap(),
            Selection::Ignored
        );
        assert_eq!(
            m.answers().get(&ItemId::new("item1")),
            Some(&Answer::NoAnswer)
        );
        assert!(!m.answers().contains(&ItemId::new("item2")));
    }

    #[test]
    fn unknown_option_is_a_validation_error() {
        let mut m = active(1);
        let err = m.answer(&ItemId::new("item1"), "maybe").unwrap_err();
        assert!(matches!(err, MachineError::UnknownOption { .. }));
        assert!(m.answers().is_empty());
    }

    #[test]
    fn reselecting_replaces_current_choice() {
        let mut m = active(1);
        m.answer(&ItemId::new("item1"), "true").unwrap();
        m.answer(&ItemId::new("item1"), "false").unwrap();
        assert_eq!(m.answers().len(), 1);
        assert_eq!(
            m.answers().get(&ItemId::new("item1")),
            Some(&Answer::choice("false"))
        );
    }

    #[test]
    fn answers_grow_with_index() {
        let mut m = active(3);
        assert_eq!(m.answers().len(), 0);
        m.answer(&ItemId::new("item1"), "true").unwrap();
        assert_eq!(m.answers().len(), m.current_index() + 1);
        m.advance();
        assert_eq!(m.answers().len(), m.current_index());
    }

    #[test]
    fn submit_failure_returns_to_last_item_and_retry_resubmits() {
        let mut m = active(2);
        m.answer(&ItemId::new("item1"), "true").unwrap();
        m.advance();
        m.answer(&ItemId::new("item2"), "false").unwrap();
        assert_eq!(m.advance(), Step::Exhausted);
        let answers = m.answers().clone();

        m.submit_failed().unwrap();
        assert_eq!(m.phase(), Phase::Active);
        assert!(m.is_retrying());
        assert_eq!(m.current_index(), 1);
        assert_eq!(m.remaining_seconds(), 0);
        assert_eq!(m.answers(), &answers);

        assert_eq!(
            m.answer(&ItemId::new("item2"), "true").unwrap(),
            Selection::Ignored
        );
        assert_eq!(m.answers(), &answers);

        assert_eq!(m.advance(), Step::Exhausted);
        assert!(!m.is_retrying());
        assert_eq!(m.answers(), &answers);
        m.submit_ack().unwrap();
        assert_eq!(m.phase(), Phase::Finished);
    }

    #[test]
    fn expired_final_item_stays_no_answer_across_failed_submits() {
        let mut m = active(1);
        assert_eq!(m.expire(), Step::Exhausted);
        for _ in 0..2 {
            m.submit_failed().unwrap();
            assert_eq!(
                m.answer(&ItemId::new("item1"), "true").unwrap(),
                Selection::Ignored
            );
            assert_eq!(m.tick(5), Ok(()));
            assert_eq!(m.remaining_seconds(), 0);
            assert_eq!(m.advance(), Step::Exhausted);
        }
        assert_eq!(
            m.answers().get(&ItemId::new("item1")),
            Some(&Answer::NoAnswer)
        );
        assert_eq!(m.advances(), 3);
    }

    #[test]
    fn finished_machine_rejects_everything() {
        let mut m = active(1);
        m.advance();
        m.submit_ack().unwrap();
        assert_eq!(m.advance(), Step::Ignored);
        assert_eq!(
            m.answer(&ItemId::new("item1"), "true").unwrap(),
            Selection::Ignored
        );
        assert!(!m.fail("late"));
        assert_eq!(m.phase(), Phase::Finished);
    }

    #[test]
    fn fail_aborts_from_any_open_phase() {
        let mut m = RoundMachine::new();
        assert!(m.fail("boom"));
        assert_eq!(m.phase(), Phase::Aborted);
        assert_eq!(m.abort_reason(), Some("boom"));

        let mut m = active(2);
        assert!(m.fail("host closed"));
        assert_eq!(m.advance(), Step::Ignored);
    }

    #[test]
    fn tick_reports_desync_for_impossible_values() {
        let mut m = active(1);
        m.tick(12).unwrap();
        assert_eq!(m.remaining_seconds(), 12);
        assert_eq!(
            m.tick(-1),
            Err(TimerDesync {
                reported: -1,
                budget: 30
            })
        );
        assert!(m.tick(31).is_err());
        assert_eq!(m.remaining_seconds(), 12);
    }

    #[test]
    fn snapshot_exposes_current_item() {
        let mut m = active(2);
        m.answer(&ItemId::new("item1"), "true").unwrap();
        let snap = m.snapshot();
        assert_eq!(snap.phase, Phase::Active);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.current_item.as_ref().map(|i| i.id().as_str()), Some("item1"));
        assert_eq!(snap.current_answer(), Some(&Answer::choice("true")));
    }
}

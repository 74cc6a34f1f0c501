use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Countdown notifications for the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick { remaining: u32 },
    Expired,
}

#[derive(Debug)]
struct Tagged {
    generation: u64,
    event: ClockEvent,
}

/// Per-item countdown running on the tokio runtime.
///
/// Every countdown carries a generation tag; `recv` drops events whose generation
/// is not the current one, so a cancelled countdown never reaches the caller even
/// when its events are already queued.
#[derive(Debug)]
pub struct RoundClock {
    period: Duration,
    generation: u64,
    active: bool,
    task: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Tagged>,
    rx: mpsc::UnboundedReceiver<Tagged>,
}

impl Default for RoundClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD)
    }
}

impl RoundClock {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            period,
            generation: 0,
            active: false,
            task: None,
            tx,
            rx,
        }
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start counting down from `seconds`, replacing any running countdown.
    ///
    /// Must be called from within a tokio runtime. A zero duration expires immediately.
    pub fn start(&mut self, seconds: u32) {
        self.cancel();
        self.generation += 1;
        self.active = true;
        let generation = self.generation;

        if seconds == 0 {
            let _ = self.tx.send(Tagged {
                generation,
                event: ClockEvent::Expired,
            });
            return;
        }

        let tx = self.tx.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let origin = Instant::now();
            for elapsed in 1..=seconds {
                sleep_until(origin + period * elapsed).await;
                let remaining = seconds - elapsed;
                let event = if remaining == 0 {
                    ClockEvent::Expired
                } else {
                    ClockEvent::Tick { remaining }
                };
                if tx.send(Tagged { generation, event }).is_err() {
                    return;
                }
            }
        }));
    }

    /// Stop the running countdown. Idempotent.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if self.active {
            self.active = false;
            self.generation += 1;
        }
    }

    pub fn reset(&mut self, seconds: u32) {
        self.cancel();
        self.start(seconds);
    }

    /// Next event of the active countdown, or `None` when nothing is counting down.
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<ClockEvent> {
        loop {
            if !self.active {
                return None;
            }
            let tagged = self.rx.recv().await?;
            if tagged.generation != self.generation {
                continue;
            }
            if tagged.event == ClockEvent::Expired {
                self.active = false;
                self.task = None;
            }
            return Some(tagged.event);
        }
    }
}

impl Drop for RoundClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

use quiz_core::model::{Leaderboard, RoundSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Capability to be told when a round's participant list changes.
///
/// How updates are obtained (push, long-poll, interval refetch) is the adapter's concern.
pub trait ParticipantSource: Send + Sync {
    fn subscribe(&self, source: &RoundSource) -> ParticipantStream;
}

/// Receiving end of a participant subscription. Yields only changed lists.
///
/// Dropping the stream stops any background refetch behind it.
pub struct ParticipantStream {
    rx: watch::Receiver<Leaderboard>,
    poller: Option<JoinHandle<()>>,
}

impl ParticipantStream {
    #[must_use]
    pub fn from_watch(rx: watch::Receiver<Leaderboard>) -> Self {
        Self { rx, poller: None }
    }

    pub(crate) fn polling(rx: watch::Receiver<Leaderboard>, poller: JoinHandle<()>) -> Self {
        Self {
            rx,
            poller: Some(poller),
        }
    }

    /// A stream that never yields; used when the source cannot be subscribed.
    #[must_use]
    pub fn closed() -> Self {
        let (_tx, rx) = watch::channel(Leaderboard::default());
        Self { rx, poller: None }
    }

    /// Wait for the next changed list. Returns `None` once the source is gone.
    pub async fn changed(&mut self) -> Option<Leaderboard> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Latest known list without waiting.
    #[must_use]
    pub fn latest(&self) -> Leaderboard {
        self.rx.borrow().clone()
    }
}

impl Drop for ParticipantStream {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl std::fmt::Debug for ParticipantStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantStream")
            .field("polling", &self.poller.is_some())
            .finish_non_exhaustive()
    }
}

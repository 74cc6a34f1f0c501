use std::env;

use quiz_core::model::ParticipantId;

/// Participant identity handed to the controller at construction.
///
/// The wallet address keys both scoring and reward payout; how it was obtained
/// (browser wallet, CLI flag, env) is the shell's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletIdentity {
    participant: ParticipantId,
}

impl WalletIdentity {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            participant: ParticipantId::new(address),
        }
    }

    /// Read `QUIZ_WALLET`. Returns `None` if unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let address = env::var("QUIZ_WALLET").ok()?;
        let address = address.trim();
        if address.is_empty() {
            return None;
        }
        Some(Self::new(address))
    }

    #[must_use]
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }
}

impl From<ParticipantId> for WalletIdentity {
    fn from(participant: ParticipantId) -> Self {
        Self { participant }
    }
}

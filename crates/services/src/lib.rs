#![forbid(unsafe_code)]

pub mod clock;
pub mod controller;
pub mod error;
pub mod feed;
pub mod host;
pub mod identity;
pub mod practice;
pub mod submitter;

pub use quiz_core::Clock;

pub use clock::{ClockEvent, RoundClock};
pub use controller::{Advance, ControllerConfig, RoundController, RoundEvent};
pub use error::{ControllerError, HostError, LoadError, SubmissionError, ValidationError};
pub use feed::ParticipantFeed;
pub use host::HostService;
pub use identity::WalletIdentity;
pub use practice::PracticeSession;
pub use submitter::{ResultSubmitter, SubmissionToken};

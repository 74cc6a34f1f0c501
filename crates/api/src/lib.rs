#![forbid(unsafe_code)]

pub mod client;
pub mod feed;
pub mod http;

pub use client::{ApiError, HostApi, InMemoryApi, PracticeApi, RoundApi};
pub use feed::{ParticipantSource, ParticipantStream};
pub use http::{ApiConfig, HttpApi};

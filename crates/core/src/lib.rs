#![forbid(unsafe_code)]

pub mod error;
pub mod machine;
pub mod model;
pub mod time;

pub use error::Error;
pub use machine::{Phase, RoundMachine, RoundSnapshot, Selection, Step};
pub use time::Clock;

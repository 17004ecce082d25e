pub mod cache;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod job;
pub mod normalize;
pub mod relay;
pub mod types;

pub use error::{RelayError, Result};
pub use job::{CyclePhase, CycleReport, CycleStatus};
pub use relay::Relay;

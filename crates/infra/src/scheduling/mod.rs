//! Background scheduling

mod error;
mod reaper;

pub use error::{SchedulerError, SchedulerResult};
pub use reaper::ExpiryReaper;

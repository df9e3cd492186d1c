//! Match start scheduling

pub mod service;

pub use service::{MatchScheduler, SchedulerError};

//! Game simulation modules

pub mod broadcast;
pub mod collision;
pub mod effects;
pub mod entities;
pub mod lifecycle;
pub mod r#match;
pub mod physics;
pub mod placement;
pub mod scoring;
pub mod snapshot;
pub mod supervisor;

pub use r#match::{GameMatch, MatchOutcome};
pub use supervisor::{MatchRegistry, MatchSupervisor};

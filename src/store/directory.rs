//! Match directory - sessions, parameters, results and tournament progress
//!
//! The simulation only talks to the `MatchDirectory` trait. The in-memory
//! implementation backs local play and tests; `SupabaseDirectory` talks to
//! the hosted database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::SupabaseError;
use crate::ws::protocol::Side;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Waiting,
    Running,
    Finished,
    Cancelled,
}

/// Ball speed tier (stored as 1..=3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BallSpeed {
    Slow,
    Medium,
    Fast,
}

impl BallSpeed {
    /// Per-axis speed on respawn
    pub fn magnitude(self) -> f32 {
        match self {
            BallSpeed::Slow => 3.0,
            BallSpeed::Medium => 5.0,
            BallSpeed::Fast => 8.0,
        }
    }
}

impl TryFrom<u8> for BallSpeed {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(BallSpeed::Slow),
            2 => Ok(BallSpeed::Medium),
            3 => Ok(BallSpeed::Fast),
            other => Err(format!("unknown ball speed tier {other}")),
        }
    }
}

impl From<BallSpeed> for u8 {
    fn from(speed: BallSpeed) -> u8 {
        match speed {
            BallSpeed::Slow => 1,
            BallSpeed::Medium => 2,
            BallSpeed::Fast => 3,
        }
    }
}

/// Paddle size tier (stored as 1..=3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PaddleSize {
    Small,
    Medium,
    Large,
}

impl PaddleSize {
    pub fn height(self) -> f32 {
        match self {
            PaddleSize::Small => 60.0,
            PaddleSize::Medium => 80.0,
            PaddleSize::Large => 100.0,
        }
    }
}

impl TryFrom<u8> for PaddleSize {
    type Error = String;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(PaddleSize::Small),
            2 => Ok(PaddleSize::Medium),
            3 => Ok(PaddleSize::Large),
            other => Err(format!("unknown paddle size tier {other}")),
        }
    }
}

impl From<PaddleSize> for u8 {
    fn from(size: PaddleSize) -> u8 {
        match size {
            PaddleSize::Small => 1,
            PaddleSize::Medium => 2,
            PaddleSize::Large => 3,
        }
    }
}

/// Per-match game parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParameters {
    pub ball_speed: BallSpeed,
    pub paddle_size: PaddleSize,
    pub bonus_enabled: bool,
    pub obstacles_enabled: bool,
}

impl Default for MatchParameters {
    fn default() -> Self {
        Self {
            ball_speed: BallSpeed::Medium,
            paddle_size: PaddleSize::Medium,
            bonus_enabled: true,
            obstacles_enabled: false,
        }
    }
}

/// Bracket round a match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentPhase {
    Semifinal1,
    Semifinal2,
    Final,
}

impl TournamentPhase {
    /// Tournament status once this round is decided
    pub fn completed_status(self) -> &'static str {
        match self {
            TournamentPhase::Semifinal1 => "semifinal1_done",
            TournamentPhase::Semifinal2 => "semifinal2_done",
            TournamentPhase::Final => "finished",
        }
    }

    /// Column holding this round's winner
    pub fn winner_column(self) -> &'static str {
        match self {
            TournamentPhase::Semifinal1 => "winner_semifinal_1",
            TournamentPhase::Semifinal2 => "winner_semifinal_2",
            TournamentPhase::Final => "winner_final",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TournamentSlot {
    pub tournament_id: Uuid,
    pub phase: TournamentPhase,
}

/// Match session created before the loop starts
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSession {
    pub id: Uuid,
    pub status: MatchStatus,
    pub is_online: bool,
    pub player_left: Option<Uuid>,
    pub player_right: Option<Uuid>,
    pub player_left_local: Option<String>,
    pub player_right_local: Option<String>,
    pub ready_left: bool,
    pub ready_right: bool,
    /// Tournament id echoed in `game_over`
    pub tournament_id: Option<Uuid>,
}

impl MatchSession {
    /// A waiting local match between two named players
    pub fn local(id: Uuid, left: &str, right: &str) -> Self {
        Self {
            id,
            status: MatchStatus::Waiting,
            is_online: false,
            player_left: None,
            player_right: None,
            player_left_local: Some(left.to_string()),
            player_right_local: Some(right.to_string()),
            ready_left: false,
            ready_right: false,
            tournament_id: None,
        }
    }

    pub fn both_ready(&self) -> bool {
        self.ready_left && self.ready_right
    }

    pub fn player(&self, side: Side) -> Option<Uuid> {
        match side {
            Side::Left => self.player_left,
            Side::Right => self.player_right,
        }
    }

    pub fn local_alias(&self, side: Side) -> Option<&str> {
        match side {
            Side::Left => self.player_left_local.as_deref(),
            Side::Right => self.player_right_local.as_deref(),
        }
    }

    /// Display label: the player id for online matches, the alias otherwise
    pub fn label(&self, side: Side) -> String {
        let label = if self.is_online {
            self.player(side).map(|id| id.to_string())
        } else {
            self.local_alias(side).map(str::to_string)
        };
        label.unwrap_or_else(|| side.to_string())
    }
}

/// Final outcome of a finished match, produced once
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub match_id: Uuid,
    pub winner: Side,
    pub loser: Side,
    pub winner_player: Option<Uuid>,
    pub loser_player: Option<Uuid>,
    pub winner_local: Option<String>,
    pub loser_local: Option<String>,
    pub winner_label: String,
    pub loser_label: String,
    pub score_left: u32,
    pub score_right: u32,
    pub ended_at: DateTime<Utc>,
}

/// Collaborator calls made by the simulation
#[async_trait]
pub trait MatchDirectory: Send + Sync {
    async fn get_match_session(&self, match_id: Uuid) -> Result<MatchSession, DirectoryError>;

    async fn get_match_parameters(&self, match_id: Uuid)
        -> Result<MatchParameters, DirectoryError>;

    /// Update the status and return the refreshed session
    async fn set_match_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
    ) -> Result<MatchSession, DirectoryError>;

    async fn is_online_match(&self, match_id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.get_match_session(match_id).await?.is_online)
    }

    /// Store the final result; skipped when the session was cancelled
    async fn persist_match_result(&self, result: &MatchResult) -> Result<(), DirectoryError>;

    /// Bracket round this match decides, if any
    async fn tournament_slot(&self, match_id: Uuid)
        -> Result<Option<TournamentSlot>, DirectoryError>;

    async fn notify_tournament_progress(
        &self,
        tournament_id: Uuid,
        phase: TournamentPhase,
        winner: &str,
    ) -> Result<(), DirectoryError>;

    /// Mark one side ready (local matches signal readiness over HTTP)
    async fn mark_ready(&self, match_id: Uuid, side: Side) -> Result<(), DirectoryError>;
}

/// Directory errors
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Match session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Match session {0} has no parameters")]
    ParametersNotFound(Uuid),

    #[error("Directory backend error: {0}")]
    Backend(#[from] SupabaseError),
}

/// Recorded tournament progression
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentUpdate {
    pub tournament_id: Uuid,
    pub phase: TournamentPhase,
    pub winner: String,
}

/// In-process directory for local play and tests
#[derive(Default)]
pub struct InMemoryDirectory {
    sessions: DashMap<Uuid, MatchSession>,
    parameters: DashMap<Uuid, MatchParameters>,
    results: DashMap<Uuid, MatchResult>,
    slots: DashMap<Uuid, TournamentSlot>,
    tournament_updates: Mutex<Vec<TournamentUpdate>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, optionally with its parameters
    pub fn insert_session(&self, session: MatchSession, parameters: Option<MatchParameters>) {
        if let Some(parameters) = parameters {
            self.parameters.insert(session.id, parameters);
        }
        self.sessions.insert(session.id, session);
    }

    /// Place a registered match into a tournament bracket
    pub fn assign_tournament_slot(&self, match_id: Uuid, slot: TournamentSlot) {
        if let Some(mut session) = self.sessions.get_mut(&match_id) {
            session.tournament_id = Some(slot.tournament_id);
        }
        self.slots.insert(match_id, slot);
    }

    pub fn result(&self, match_id: Uuid) -> Option<MatchResult> {
        self.results.get(&match_id).map(|r| r.value().clone())
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn tournament_updates(&self) -> Vec<TournamentUpdate> {
        self.tournament_updates.lock().clone()
    }
}

#[async_trait]
impl MatchDirectory for InMemoryDirectory {
    async fn get_match_session(&self, match_id: Uuid) -> Result<MatchSession, DirectoryError> {
        self.sessions
            .get(&match_id)
            .map(|s| s.value().clone())
            .ok_or(DirectoryError::SessionNotFound(match_id))
    }

    async fn get_match_parameters(
        &self,
        match_id: Uuid,
    ) -> Result<MatchParameters, DirectoryError> {
        if !self.sessions.contains_key(&match_id) {
            return Err(DirectoryError::SessionNotFound(match_id));
        }
        self.parameters
            .get(&match_id)
            .map(|p| p.value().clone())
            .ok_or(DirectoryError::ParametersNotFound(match_id))
    }

    async fn set_match_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
    ) -> Result<MatchSession, DirectoryError> {
        let mut session = self
            .sessions
            .get_mut(&match_id)
            .ok_or(DirectoryError::SessionNotFound(match_id))?;
        session.status = status;
        Ok(session.value().clone())
    }

    async fn persist_match_result(&self, result: &MatchResult) -> Result<(), DirectoryError> {
        let session = self.get_match_session(result.match_id).await?;
        if session.status == MatchStatus::Cancelled {
            tracing::info!(match_id = %result.match_id, "Match cancelled, result not stored");
            return Ok(());
        }
        self.results.insert(result.match_id, result.clone());
        Ok(())
    }

    async fn tournament_slot(
        &self,
        match_id: Uuid,
    ) -> Result<Option<TournamentSlot>, DirectoryError> {
        Ok(self.slots.get(&match_id).map(|slot| *slot.value()))
    }

    async fn notify_tournament_progress(
        &self,
        tournament_id: Uuid,
        phase: TournamentPhase,
        winner: &str,
    ) -> Result<(), DirectoryError> {
        self.tournament_updates.lock().push(TournamentUpdate {
            tournament_id,
            phase,
            winner: winner.to_string(),
        });
        Ok(())
    }

    async fn mark_ready(&self, match_id: Uuid, side: Side) -> Result<(), DirectoryError> {
        let mut session = self
            .sessions
            .get_mut(&match_id)
            .ok_or(DirectoryError::SessionNotFound(match_id))?;
        match side {
            Side::Left => session.ready_left = true,
            Side::Right => session.ready_right = true,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(match_id: Uuid) -> MatchResult {
        MatchResult {
            match_id,
            winner: Side::Right,
            loser: Side::Left,
            winner_player: None,
            loser_player: None,
            winner_local: Some("bob".into()),
            loser_local: Some("alice".into()),
            winner_label: "bob".into(),
            loser_label: "alice".into(),
            score_left: 1,
            score_right: 3,
            ended_at: Utc::now(),
        }
    }

    #[test]
    fn tiers_decode_from_stored_integers() {
        let params: MatchParameters = serde_json::from_str(
            r#"{"ball_speed":3,"paddle_size":1,"bonus_enabled":true,"obstacles_enabled":false}"#,
        )
        .unwrap();
        assert_eq!(params.ball_speed.magnitude(), 8.0);
        assert_eq!(params.paddle_size.height(), 60.0);
        assert!(serde_json::from_str::<BallSpeed>("4").is_err());
    }

    #[test]
    fn labels_follow_online_flag() {
        let mut session = MatchSession::local(Uuid::new_v4(), "alice", "bob");
        assert_eq!(session.label(Side::Left), "alice");

        let right = Uuid::new_v4();
        session.is_online = true;
        session.player_right = Some(right);
        assert_eq!(session.label(Side::Right), right.to_string());
        assert_eq!(session.label(Side::Left), "left");
    }

    #[tokio::test]
    async fn missing_session_and_parameters() {
        let directory = InMemoryDirectory::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            directory.get_match_session(id).await,
            Err(DirectoryError::SessionNotFound(_))
        ));

        directory.insert_session(MatchSession::local(id, "a", "b"), None);
        assert!(matches!(
            directory.get_match_parameters(id).await,
            Err(DirectoryError::ParametersNotFound(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_match_result_is_skipped() {
        let directory = InMemoryDirectory::new();
        let id = Uuid::new_v4();
        directory.insert_session(MatchSession::local(id, "alice", "bob"), None);

        directory
            .set_match_status(id, MatchStatus::Cancelled)
            .await
            .unwrap();
        directory.persist_match_result(&sample_result(id)).await.unwrap();
        assert_eq!(directory.result_count(), 0);

        directory
            .set_match_status(id, MatchStatus::Finished)
            .await
            .unwrap();
        directory.persist_match_result(&sample_result(id)).await.unwrap();
        assert_eq!(directory.result(id).map(|r| r.score_right), Some(3));
    }

    #[tokio::test]
    async fn readiness_is_per_side() {
        let directory = InMemoryDirectory::new();
        let id = Uuid::new_v4();
        directory.insert_session(MatchSession::local(id, "a", "b"), None);

        directory.mark_ready(id, Side::Left).await.unwrap();
        assert!(!directory.get_match_session(id).await.unwrap().both_ready());
        directory.mark_ready(id, Side::Right).await.unwrap();
        assert!(directory.get_match_session(id).await.unwrap().both_ready());
        assert!(!directory.is_online_match(id).await.unwrap());
    }
}

//! Match sessions, parameters, results and local tournaments in Supabase

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::directory::{
    DirectoryError, MatchDirectory, MatchParameters, MatchResult, MatchSession, MatchStatus,
    TournamentPhase, TournamentSlot,
};
use super::supabase::SupabaseClient;
use crate::ws::protocol::Side;

/// Row of the `game_sessions` table
#[derive(Debug, Clone, Deserialize)]
struct SessionRow {
    id: Uuid,
    status: MatchStatus,
    is_online: bool,
    player_left_id: Option<Uuid>,
    player_right_id: Option<Uuid>,
    player_left_local: Option<String>,
    player_right_local: Option<String>,
    ready_left: bool,
    ready_right: bool,
    tournament_id: Option<Uuid>,
}

impl From<SessionRow> for MatchSession {
    fn from(row: SessionRow) -> Self {
        MatchSession {
            id: row.id,
            status: row.status,
            is_online: row.is_online,
            player_left: row.player_left_id,
            player_right: row.player_right_id,
            player_left_local: row.player_left_local,
            player_right_local: row.player_right_local,
            ready_left: row.ready_left,
            ready_right: row.ready_right,
            tournament_id: row.tournament_id,
        }
    }
}

/// Bracket columns of `local_tournaments`
#[derive(Debug, Clone, Deserialize)]
struct TournamentRow {
    id: Uuid,
    semifinal1_id: Option<Uuid>,
    semifinal2_id: Option<Uuid>,
    final_id: Option<Uuid>,
}

impl TournamentRow {
    fn slot_for(&self, match_id: Uuid) -> Option<TournamentSlot> {
        let phase = if self.semifinal1_id == Some(match_id) {
            TournamentPhase::Semifinal1
        } else if self.semifinal2_id == Some(match_id) {
            TournamentPhase::Semifinal2
        } else if self.final_id == Some(match_id) {
            TournamentPhase::Final
        } else {
            return None;
        };
        Some(TournamentSlot {
            tournament_id: self.id,
            phase,
        })
    }
}

/// New row for `game_results`
#[derive(Debug, Clone, Serialize)]
struct NewResult {
    game_id: Uuid,
    winner_id: Option<Uuid>,
    #[serde(rename = "looser_id")]
    loser_id: Option<Uuid>,
    winner_local: Option<String>,
    #[serde(rename = "looser_local")]
    loser_local: Option<String>,
    score_left: u32,
    score_right: u32,
    ended_at: chrono::DateTime<chrono::Utc>,
}

impl From<&MatchResult> for NewResult {
    fn from(result: &MatchResult) -> Self {
        NewResult {
            game_id: result.match_id,
            winner_id: result.winner_player,
            loser_id: result.loser_player,
            winner_local: result.winner_local.clone(),
            loser_local: result.loser_local.clone(),
            score_left: result.score_left,
            score_right: result.score_right,
            ended_at: result.ended_at,
        }
    }
}

/// Match directory backed by Supabase tables
#[derive(Clone)]
pub struct SupabaseDirectory {
    client: SupabaseClient,
}

impl SupabaseDirectory {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn session_row(&self, match_id: Uuid) -> Result<SessionRow, DirectoryError> {
        let query = format!("id=eq.{}", match_id);
        self.client
            .get_one("game_sessions", &query)
            .await?
            .ok_or(DirectoryError::SessionNotFound(match_id))
    }
}

#[async_trait]
impl MatchDirectory for SupabaseDirectory {
    async fn get_match_session(&self, match_id: Uuid) -> Result<MatchSession, DirectoryError> {
        self.session_row(match_id).await.map(MatchSession::from)
    }

    async fn get_match_parameters(
        &self,
        match_id: Uuid,
    ) -> Result<MatchParameters, DirectoryError> {
        let query = format!(
            "game_session_id=eq.{}&select=ball_speed,paddle_size,bonus_enabled,obstacles_enabled",
            match_id
        );
        self.client
            .get_one("game_parameters", &query)
            .await?
            .ok_or(DirectoryError::ParametersNotFound(match_id))
    }

    async fn set_match_status(
        &self,
        match_id: Uuid,
        status: MatchStatus,
    ) -> Result<MatchSession, DirectoryError> {
        let query = format!("id=eq.{}", match_id);
        let rows: Vec<SessionRow> = self
            .client
            .update("game_sessions", &query, &json!({ "status": status }))
            .await?;
        rows.into_iter()
            .next()
            .map(MatchSession::from)
            .ok_or(DirectoryError::SessionNotFound(match_id))
    }

    async fn persist_match_result(&self, result: &MatchResult) -> Result<(), DirectoryError> {
        let session = self.session_row(result.match_id).await?;
        if session.status == MatchStatus::Cancelled {
            tracing::info!(match_id = %result.match_id, "Match cancelled, result not stored");
            return Ok(());
        }

        self.client
            .insert("game_results", &NewResult::from(result))
            .await?;
        tracing::info!(
            match_id = %result.match_id,
            score_left = result.score_left,
            score_right = result.score_right,
            "Match result stored"
        );
        Ok(())
    }

    async fn tournament_slot(
        &self,
        match_id: Uuid,
    ) -> Result<Option<TournamentSlot>, DirectoryError> {
        let query = format!(
            "or=(semifinal1_id.eq.{id},semifinal2_id.eq.{id},final_id.eq.{id})\
             &select=id,semifinal1_id,semifinal2_id,final_id&limit=1",
            id = match_id
        );
        let rows: Vec<TournamentRow> = self.client.get("local_tournaments", &query).await?;
        Ok(rows.iter().find_map(|row| row.slot_for(match_id)))
    }

    async fn notify_tournament_progress(
        &self,
        tournament_id: Uuid,
        phase: TournamentPhase,
        winner: &str,
    ) -> Result<(), DirectoryError> {
        let query = format!("id=eq.{}", tournament_id);
        let mut body = serde_json::Map::new();
        body.insert("status".into(), json!(phase.completed_status()));
        body.insert(phase.winner_column().into(), json!(winner));

        let _: Vec<serde_json::Value> = self
            .client
            .update("local_tournaments", &query, &body)
            .await?;
        Ok(())
    }

    async fn mark_ready(&self, match_id: Uuid, side: Side) -> Result<(), DirectoryError> {
        let query = format!("id=eq.{}", match_id);
        let column = match side {
            Side::Left => "ready_left",
            Side::Right => "ready_right",
        };
        let rows: Vec<serde_json::Value> = self
            .client
            .update("game_sessions", &query, &json!({ column: true }))
            .await?;
        if rows.is_empty() {
            return Err(DirectoryError::SessionNotFound(match_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_row_resolves_phase() {
        let match_id = Uuid::new_v4();
        let row = TournamentRow {
            id: Uuid::new_v4(),
            semifinal1_id: Some(Uuid::new_v4()),
            semifinal2_id: Some(match_id),
            final_id: None,
        };
        let slot = row.slot_for(match_id).unwrap();
        assert_eq!(slot.phase, TournamentPhase::Semifinal2);
        assert_eq!(slot.tournament_id, row.id);
        assert!(row.slot_for(Uuid::new_v4()).is_none());
    }

    #[test]
    fn session_row_decodes() {
        let id = Uuid::new_v4();
        let raw = json!({
            "id": id,
            "status": "waiting",
            "is_online": false,
            "player_left_id": null,
            "player_right_id": null,
            "player_left_local": "alice",
            "player_right_local": "bob",
            "ready_left": true,
            "ready_right": false,
            "tournament_id": null,
            "created_at": "2024-01-01T00:00:00Z"
        });
        let session: MatchSession = serde_json::from_value::<SessionRow>(raw).unwrap().into();
        assert_eq!(session.id, id);
        assert_eq!(session.local_alias(Side::Right), Some("bob"));
        assert!(!session.both_ready());
    }
}

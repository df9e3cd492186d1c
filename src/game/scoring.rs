//! Scores, win detection and match finalization

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::store::directory::{MatchDirectory, MatchResult, MatchSession, MatchStatus};
use crate::store::{Field, ScopedStore};
use crate::ws::protocol::{ServerMsg, Side};

use super::broadcast::Broadcaster;

pub struct Scoreboard;

impl Scoreboard {
    /// Credit a point and return the scorer's new total
    pub fn record_point(store: &ScopedStore, scorer: Side) -> u32 {
        let score = store.u32(Field::Score(scorer)) + 1;
        store.set(Field::Score(scorer), score);
        score
    }

    pub fn scores(store: &ScopedStore) -> (u32, u32) {
        (
            store.u32(Field::Score(Side::Left)),
            store.u32(Field::Score(Side::Right)),
        )
    }

    /// Side that has reached the win threshold, if any
    pub fn winner(store: &ScopedStore, win_score: u32) -> Option<Side> {
        let (left, right) = Self::scores(store);
        if left >= win_score {
            Some(Side::Left)
        } else if right >= win_score {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// Immutable result from the final score. Ties go to the right side.
    pub fn build_result(
        match_id: Uuid,
        session: Option<&MatchSession>,
        score_left: u32,
        score_right: u32,
    ) -> MatchResult {
        let winner = if score_left > score_right {
            Side::Left
        } else {
            Side::Right
        };
        let loser = winner.opponent();
        let label = |side: Side| {
            session
                .map(|s| s.label(side))
                .unwrap_or_else(|| side.to_string())
        };

        MatchResult {
            match_id,
            winner,
            loser,
            winner_player: session.and_then(|s| s.player(winner)),
            loser_player: session.and_then(|s| s.player(loser)),
            winner_local: session.and_then(|s| s.local_alias(winner).map(str::to_string)),
            loser_local: session.and_then(|s| s.local_alias(loser).map(str::to_string)),
            winner_label: label(winner),
            loser_label: label(loser),
            score_left,
            score_right,
            ended_at: Utc::now(),
        }
    }

    /// Mark the session finished, hand the result to the directory, advance
    /// the tournament and announce `game_over`. Directory failures are logged
    /// and never stop the announcement.
    pub async fn finish(
        directory: &dyn MatchDirectory,
        store: &ScopedStore,
        events: &Broadcaster,
    ) -> MatchResult {
        let match_id = store.match_id();
        let (score_left, score_right) = Self::scores(store);

        let session = match directory
            .set_match_status(match_id, MatchStatus::Finished)
            .await
        {
            Ok(session) => Some(session),
            Err(e) => {
                error!(match_id = %match_id, error = %e, "Failed to mark match finished");
                None
            }
        };

        let result = Self::build_result(match_id, session.as_ref(), score_left, score_right);

        if let Err(e) = directory.persist_match_result(&result).await {
            error!(match_id = %match_id, error = %e, "Failed to persist match result");
        }

        let online = match directory.is_online_match(match_id).await {
            Ok(online) => online,
            Err(e) => {
                warn!(match_id = %match_id, error = %e, "Online flag lookup failed");
                false
            }
        };
        if online {
            debug!(match_id = %match_id, "Online match, no bracket to advance");
        } else {
            Self::advance_tournament(directory, &result).await;
        }

        info!(
            match_id = %match_id,
            winner = %result.winner,
            score_left,
            score_right,
            "Match finished"
        );

        events.send(ServerMsg::GameOver {
            tournament_id: session.and_then(|s| s.tournament_id),
            winner: result.winner_label.clone(),
            loser: result.loser_label.clone(),
        });
        result
    }

    /// Brackets are local-only, so the alias names the winner
    async fn advance_tournament(directory: &dyn MatchDirectory, result: &MatchResult) {
        let match_id = result.match_id;
        match directory.tournament_slot(match_id).await {
            Ok(Some(slot)) => {
                let winner = result
                    .winner_local
                    .clone()
                    .unwrap_or_else(|| result.winner_label.clone());
                if let Err(e) = directory
                    .notify_tournament_progress(slot.tournament_id, slot.phase, &winner)
                    .await
                {
                    warn!(match_id = %match_id, error = %e, "Failed to record tournament progress");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(match_id = %match_id, error = %e, "Tournament lookup failed"),
        }
    }
}

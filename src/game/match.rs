//! Match lifecycle and authoritative tick loop

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::store::directory::{
    DirectoryError, MatchDirectory, MatchParameters, MatchResult, MatchSession, MatchStatus,
};
use crate::store::{Field, ScopedStore};
use crate::util::time::{tick_duration, MatchClock};
use crate::ws::protocol::Side;

use super::broadcast::Broadcaster;
use super::collision::{CollisionSystem, PaddleOutcome};
use super::entities::{Ball, Paddles, CENTER_X, CENTER_Y};
use super::lifecycle::EffectManager;
use super::physics::PhysicsSystem;
use super::scoring::Scoreboard;
use super::snapshot::SnapshotBuilder;
use super::supervisor::MatchSupervisor;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Waiting for both sides to signal readiness
    AwaitingReadiness,
    /// Countdown before the first serve
    Countdown,
    /// Ticking
    Running,
    Finished,
    Cancelled,
}

/// How a match loop ended
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Finished(MatchResult),
    Cancelled,
}

/// Setup failures; fatal to the match they belong to
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Players not ready after {0:?}")]
    ReadyTimeout(Duration),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Objects the loop owns between ticks
struct MatchField {
    paddles: Paddles,
    ball: Ball,
    effects: EffectManager,
}

/// One authoritative Pong match
pub struct GameMatch {
    id: Uuid,
    config: MatchConfig,
    store: ScopedStore,
    directory: Arc<dyn MatchDirectory>,
    supervisor: Arc<MatchSupervisor>,
    events: Broadcaster,
    rng: ChaCha8Rng,
    clock: MatchClock,
    phase: MatchPhase,
}

impl GameMatch {
    pub fn new(
        config: MatchConfig,
        store: ScopedStore,
        directory: Arc<dyn MatchDirectory>,
        supervisor: Arc<MatchSupervisor>,
        seed: u64,
    ) -> Self {
        let id = supervisor.match_id();
        Self {
            id,
            config,
            store,
            directory,
            events: Broadcaster::new(id, supervisor.events()),
            supervisor,
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock: MatchClock::new(),
            phase: MatchPhase::AwaitingReadiness,
        }
    }

    /// Drive the match to a terminal state.
    ///
    /// Cancellation is honoured at every suspension point of the loop. Once a
    /// winner is known, finalization runs to completion. The store and every
    /// timer are released on all paths.
    pub async fn run(mut self) -> Result<MatchOutcome, MatchError> {
        info!(match_id = %self.id, "Match task started");

        let supervisor = self.supervisor.clone();
        let played = tokio::select! {
            biased;
            _ = supervisor.cancelled() => Ok(false),
            result = self.play() => result.map(|_| true),
        };

        self.conclude(played).await
    }

    async fn conclude(
        mut self,
        played: Result<bool, MatchError>,
    ) -> Result<MatchOutcome, MatchError> {
        let outcome = match played {
            Ok(true) => {
                self.phase = MatchPhase::Finished;
                let result =
                    Scoreboard::finish(self.directory.as_ref(), &self.store, &self.events).await;
                Ok(MatchOutcome::Finished(result))
            }
            Ok(false) => {
                info!(match_id = %self.id, "Match cancelled");
                self.abort().await;
                Ok(MatchOutcome::Cancelled)
            }
            Err(e) => {
                error!(match_id = %self.id, error = %e, "Match setup failed");
                self.abort().await;
                Err(e)
            }
        };

        self.supervisor.cancel();
        self.supervisor.join_timers().await;
        self.store.clear();
        debug!(match_id = %self.id, phase = ?self.phase, "Match state released");
        outcome
    }

    async fn abort(&mut self) {
        self.phase = MatchPhase::Cancelled;
        if let Err(e) = self
            .directory
            .set_match_status(self.id, MatchStatus::Cancelled)
            .await
        {
            warn!(match_id = %self.id, error = %e, "Failed to mark match cancelled");
        }
        self.events.aborted();
    }

    /// Setup, countdown and ticks until a side reaches the win score
    async fn play(&mut self) -> Result<(), MatchError> {
        let parameters = self.directory.get_match_parameters(self.id).await?;
        let session = self.wait_for_players().await?;
        info!(
            match_id = %self.id,
            online = session.is_online,
            ball_speed = ?parameters.ball_speed,
            paddle_size = ?parameters.paddle_size,
            bonus = parameters.bonus_enabled,
            obstacles = parameters.obstacles_enabled,
            "Players ready"
        );

        let mut field = self.prepare(&parameters);
        self.countdown().await;

        self.phase = MatchPhase::Running;
        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.tick(&mut field).await {
                return Ok(());
            }
        }
    }

    /// Poll the session until both sides are ready
    async fn wait_for_players(&mut self) -> Result<MatchSession, MatchError> {
        self.phase = MatchPhase::AwaitingReadiness;
        let deadline = Instant::now() + self.config.ready_timeout;

        loop {
            let session = self.directory.get_match_session(self.id).await?;
            if session.both_ready() {
                return Ok(session);
            }
            if Instant::now() >= deadline {
                return Err(MatchError::ReadyTimeout(self.config.ready_timeout));
            }
            sleep(self.config.ready_poll).await;
        }
    }

    /// Seed the store with the baseline and serve the first ball
    fn prepare(&mut self, parameters: &MatchParameters) -> MatchField {
        let height = parameters.paddle_size.height();
        let paddles = Paddles::new(height);

        self.store.set(Field::InitialPaddleHeight, height);
        self.store
            .set(Field::InitialBallSpeed, parameters.ball_speed.magnitude());
        for side in Side::BOTH {
            self.store.set(Field::PaddleHeight(side), height);
            self.store.set(Field::PaddleY(side), paddles.get(side).y);
            self.store.set(Field::PaddleInput(side), 0);
            self.store.set(Field::Score(side), 0);
        }

        let mut ball = Ball::new(CENTER_X, CENTER_Y, 0.0, 0.0);
        PhysicsSystem::reset_ball(&self.store, &mut ball, &mut self.rng);

        MatchField {
            paddles,
            ball,
            effects: EffectManager::new(self.store.clone(), parameters),
        }
    }

    async fn countdown(&mut self) {
        self.phase = MatchPhase::Countdown;
        for n in (1..=self.config.countdown_from).rev() {
            self.events.countdown(n);
            sleep(Duration::from_secs(1)).await;
        }
    }

    /// Advance one tick. Returns true once the match is decided.
    async fn tick(&mut self, field: &mut MatchField) -> bool {
        let now_ms = self.clock.elapsed_ms();

        PhysicsSystem::move_paddles(&self.store, &mut field.paddles);
        PhysicsSystem::move_ball(&self.store, &field.paddles, &mut field.ball, now_ms);

        if let Some(collision) = CollisionSystem::resolve_borders(&mut field.ball) {
            self.events.collision(collision);
        }
        for collision in CollisionSystem::resolve_bumpers(&mut field.ball, field.effects.bumpers())
        {
            self.events.collision(collision);
        }
        for kind in CollisionSystem::touched_orbs(&field.ball, field.effects.orbs()) {
            let picker = field.ball.last_toucher;
            if let Some(applied) =
                field
                    .effects
                    .pickup(kind, picker, self.clock.now(), &self.supervisor)
            {
                self.events.send(applied);
            }
        }

        match CollisionSystem::resolve_paddles(
            &self.store,
            &field.paddles,
            &mut field.ball,
            now_ms,
        ) {
            PaddleOutcome::Scored(scorer) => {
                if self.score_point(scorer, field).await {
                    return true;
                }
            }
            PaddleOutcome::Bounced(collision) => self.events.collision(collision),
            PaddleOutcome::Stuck(side) => {
                debug!(match_id = %self.id, side = %side, "Ball stuck to paddle");
            }
            PaddleOutcome::None => {}
        }
        field.ball.save(&self.store);

        let spawned = field.effects.update(&mut self.rng, self.clock.now());
        self.events.send_all(spawned);

        let state = SnapshotBuilder::build(
            &self.store,
            &field.paddles,
            &field.ball,
            field.effects.orbs(),
            field.effects.bumpers(),
        );
        self.events.send(state);
        false
    }

    /// Reset the board, pause, credit the scorer. True if that point won.
    async fn score_point(&mut self, scorer: Side, field: &mut MatchField) -> bool {
        let cleared = field.effects.reset_all(self.clock.now(), &self.supervisor);
        self.events.send_all(cleared);
        self.events.scored();

        sleep(self.config.scoring_pause).await;

        let score = Scoreboard::record_point(&self.store, scorer);
        info!(match_id = %self.id, scorer = %scorer, score, "Point scored");

        if let Some(winner) = Scoreboard::winner(&self.store, self.config.win_score) {
            debug!(match_id = %self.id, winner = %winner, "Win score reached");
            return true;
        }

        PhysicsSystem::reset_ball(&self.store, &mut field.ball, &mut self.rng);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::directory::InMemoryDirectory;
    use crate::store::StateStore;
    use crate::ws::protocol::{EffectKind, ServerMsg};
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::sync::broadcast::Receiver;

    fn ready_session(id: Uuid) -> MatchSession {
        MatchSession {
            ready_left: true,
            ready_right: true,
            ..MatchSession::local(id, "alice", "bob")
        }
    }

    fn quiet_parameters() -> MatchParameters {
        MatchParameters {
            bonus_enabled: false,
            obstacles_enabled: false,
            ..MatchParameters::default()
        }
    }

    struct Harness {
        store: StateStore,
        directory: Arc<InMemoryDirectory>,
        supervisor: Arc<MatchSupervisor>,
        rx: Receiver<ServerMsg>,
    }

    impl Harness {
        fn new(session: Option<MatchSession>) -> Self {
            let directory = Arc::new(InMemoryDirectory::new());
            let id = session.as_ref().map(|s| s.id).unwrap_or_else(Uuid::new_v4);
            if let Some(session) = session {
                directory.insert_session(session, Some(quiet_parameters()));
            }
            let supervisor = MatchSupervisor::new(id);
            let rx = supervisor.subscribe();
            Self {
                store: StateStore::new(),
                directory,
                supervisor,
                rx,
            }
        }

        fn game(&self, config: MatchConfig) -> GameMatch {
            let id = self.supervisor.match_id();
            GameMatch::new(
                config,
                self.store.scoped(id),
                self.directory.clone(),
                self.supervisor.clone(),
                7,
            )
        }

        fn drain(&mut self) -> Vec<ServerMsg> {
            let mut msgs = Vec::new();
            loop {
                match self.rx.try_recv() {
                    Ok(msg) => msgs.push(msg),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => return msgs,
                }
            }
        }
    }

    fn count(msgs: &[ServerMsg], pred: impl Fn(&ServerMsg) -> bool) -> usize {
        msgs.iter().filter(|m| pred(m)).count()
    }

    #[tokio::test(start_paused = true)]
    async fn free_ball_moves_without_events() {
        let id = Uuid::new_v4();
        let mut harness = Harness::new(Some(ready_session(id)));
        let mut game = harness.game(MatchConfig::default());

        let mut field = game.prepare(&MatchParameters::default());
        field.ball = Ball::new(400.0, 200.0, 5.0, 5.0);
        harness.drain();

        assert!(!game.tick(&mut field).await);
        assert_eq!((field.ball.x, field.ball.y), (405.0, 205.0));

        let store = harness.store.scoped(id);
        assert_eq!(store.f32(Field::BallX), 405.0);

        let msgs = harness.drain();
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], ServerMsg::GameState(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn right_side_reaching_win_score_finishes_once() {
        let id = Uuid::new_v4();
        let mut harness = Harness::new(Some(ready_session(id)));
        let mut game = harness.game(MatchConfig::default());

        let mut field = game.prepare(&quiet_parameters());
        let store = harness.store.scoped(id);
        store.set(Field::Score(Side::Left), 1);
        store.set(Field::Score(Side::Right), 2);
        // heading into the left goal well above the paddle
        field.ball = Ball::new(30.0, 100.0, -5.0, 0.0);

        assert!(game.tick(&mut field).await);
        let outcome = game.conclude(Ok(true)).await.unwrap();

        let MatchOutcome::Finished(result) = outcome else {
            panic!("expected a finished match");
        };
        assert_eq!(result.winner, Side::Right);
        assert_eq!((result.score_left, result.score_right), (1, 3));

        let stored = harness.directory.result(id).unwrap();
        assert!(stored.score_left < stored.score_right);
        assert_eq!(store.key_count(), 0);

        let msgs = harness.drain();
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::Scored { .. })), 1);
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::GameAborted)), 0);
        let overs: Vec<_> = msgs
            .iter()
            .filter_map(|m| match m {
                ServerMsg::GameOver { winner, loser, .. } => Some((winner.clone(), loser.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(overs, vec![("bob".to_string(), "alice".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_match_runs_to_completion() {
        let id = Uuid::new_v4();
        let mut harness = Harness::new(Some(ready_session(id)));
        let config = MatchConfig {
            win_score: 1,
            ..MatchConfig::default()
        };
        let task = tokio::spawn(harness.game(config).run());

        // both paddles parked at the top so every serve gets through
        sleep(Duration::from_millis(500)).await;
        let store = harness.store.scoped(id);
        store.set(Field::PaddleInput(Side::Left), -8);
        store.set(Field::PaddleInput(Side::Right), -8);

        let outcome = task.await.unwrap().unwrap();
        let MatchOutcome::Finished(result) = outcome else {
            panic!("expected a finished match");
        };

        let stored = harness.directory.result(id).unwrap();
        assert_eq!(stored.match_id, result.match_id);
        assert_eq!(stored.score_left + stored.score_right, 1);
        assert_eq!(store.key_count(), 0);
        assert_eq!(harness.supervisor.active_timers(), 0);
        assert_eq!(
            harness.directory.get_match_session(id).await.unwrap().status,
            MatchStatus::Finished
        );

        let msgs = harness.drain();
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::GameOver { .. })), 1);
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::GameAborted)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_without_result() {
        let id = Uuid::new_v4();
        let mut harness = Harness::new(Some(ready_session(id)));
        let task = tokio::spawn(harness.game(MatchConfig::default()).run());

        sleep(Duration::from_millis(4_500)).await;
        harness.supervisor.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, MatchOutcome::Cancelled));
        assert_eq!(harness.directory.result_count(), 0);
        assert_eq!(harness.store.scoped(id).key_count(), 0);
        assert_eq!(
            harness.directory.get_match_session(id).await.unwrap().status,
            MatchStatus::Cancelled
        );

        let msgs = harness.drain();
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::GameAborted)), 1);
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::GameOver { .. })), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_match_drops_pending_effect_reverts() {
        let id = Uuid::new_v4();
        let mut harness = Harness::new(Some(ready_session(id)));
        let mut game = harness.game(MatchConfig::default());
        let parameters = MatchParameters {
            bonus_enabled: true,
            ..quiet_parameters()
        };

        let mut field = game.prepare(&parameters);
        let now = game.clock.now();
        for (kind, y) in [(EffectKind::Shrink, 120.0), (EffectKind::Invert, 280.0)] {
            field.effects.activate_orb(kind, 300.0, y, now);
            let applied = field
                .effects
                .pickup(kind, Some(Side::Left), now, &harness.supervisor);
            assert!(applied.is_some());
        }
        assert_eq!(harness.supervisor.active_timers(), 2);
        harness.drain();

        harness.supervisor.cancel();
        let outcome = game.conclude(Ok(false)).await.unwrap();
        assert!(matches!(outcome, MatchOutcome::Cancelled));

        // well past both effect durations
        sleep(Duration::from_secs(6)).await;

        let store = harness.store.scoped(id);
        assert_eq!(harness.supervisor.active_timers(), 0);
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.get(Field::PaddleHeight(Side::Right)), None);
        assert!(!store.flag(Field::Inverted(Side::Right)));

        let msgs = harness.drain();
        assert_eq!(count(&msgs, |m| matches!(m, ServerMsg::GameAborted)), 1);
        assert_eq!(
            count(&msgs, |m| matches!(
                m,
                ServerMsg::PowerupApplied { .. } | ServerMsg::PowerupExpired { .. }
            )),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_timeout_is_fatal() {
        let id = Uuid::new_v4();
        let mut harness = Harness::new(Some(MatchSession::local(id, "alice", "bob")));
        let config = MatchConfig {
            ready_timeout: Duration::from_secs(2),
            ..MatchConfig::default()
        };

        let err = harness.game(config).run().await.unwrap_err();
        assert!(matches!(err, MatchError::ReadyTimeout(_)));
        assert_eq!(harness.directory.result_count(), 0);

        let msgs = harness.drain();
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], ServerMsg::GameAborted));
    }

    #[tokio::test]
    async fn unknown_session_is_fatal() {
        let mut harness = Harness::new(None);
        let err = harness
            .game(MatchConfig::default())
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::Directory(DirectoryError::SessionNotFound(_))
        ));
        let msgs = harness.drain();
        assert!(matches!(msgs.as_slice(), [ServerMsg::GameAborted]));
    }
}

//! Per-tick state snapshots

use crate::store::{Field, ScopedStore};
use crate::ws::protocol::{GameStateSnapshot, ServerMsg, Side};

use super::entities::{Ball, Bumper, Paddles, PowerUpOrb, PADDLE_WIDTH};

/// Builds `game_state` messages from the current match view
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn build(
        store: &ScopedStore,
        paddles: &Paddles,
        ball: &Ball,
        orbs: &[PowerUpOrb],
        bumpers: &[Bumper],
    ) -> ServerMsg {
        ServerMsg::GameState(GameStateSnapshot {
            ball_x: ball.x,
            ball_y: ball.y,
            ball_size: ball.radius,
            ball_speed_x: ball.vx,
            ball_speed_y: ball.vy,
            paddle_left_y: paddles.left.y,
            paddle_right_y: paddles.right.y,
            paddle_width: PADDLE_WIDTH,
            paddle_left_height: paddles.left.height,
            paddle_right_height: paddles.right.height,
            score_left: store.u32(Field::Score(Side::Left)),
            score_right: store.u32(Field::Score(Side::Right)),
            powerups: orbs.iter().filter(|o| o.active).map(PowerUpOrb::view).collect(),
            bumpers: bumpers.iter().filter(|b| b.active).map(Bumper::view).collect(),
            flash_effect: store.flag(Field::FlashEffect),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use crate::ws::protocol::EffectKind;
    use tokio::time::Instant;
    use uuid::Uuid;

    #[test]
    fn snapshot_lists_only_live_objects() {
        let store = StateStore::new().scoped(Uuid::new_v4());
        store.set(Field::Score(Side::Right), 2);
        store.set_flag(Field::FlashEffect, true);

        let now = Instant::now();
        let mut live = PowerUpOrb::new(EffectKind::Speed);
        live.activate(250.0, 100.0, now);
        let idle = PowerUpOrb::new(EffectKind::Ice);

        let msg = SnapshotBuilder::build(
            &store,
            &Paddles::new(80.0),
            &Ball::new(400.0, 200.0, 5.0, 5.0),
            &[live, idle],
            &[Bumper::new(0)],
        );

        let ServerMsg::GameState(state) = msg else {
            panic!("expected game_state");
        };
        assert_eq!(state.powerups.len(), 1);
        assert_eq!(state.powerups[0].color, [255, 215, 0]);
        assert!(state.bumpers.is_empty());
        assert_eq!((state.score_left, state.score_right), (0, 2));
        assert!(state.flash_effect);
    }
}

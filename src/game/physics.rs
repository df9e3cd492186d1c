//! Paddle and ball movement, stick/release and rebound speed

use std::f32::consts::FRAC_PI_4;

use rand::Rng;

use crate::store::{Field, ScopedStore};
use crate::ws::protocol::Side;

use super::entities::{
    Ball, Paddle, Paddles, BOOST_MULTIPLIER, CENTER_X, CENTER_Y, FIELD_BOTTOM, FIELD_TOP,
    ICE_ACCELERATION, ICE_FRICTION, MAX_SPEED, MIN_SPEED, PADDLE_SPEED, REBOUND_SPEEDUP,
    SPEED_BOOST_FACTOR, STICK_DURATION_MS,
};

/// Physics system for paddle and ball motion
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Move both paddles from their stored input and modifiers
    pub fn move_paddles(store: &ScopedStore, paddles: &mut Paddles) {
        let initial_height = store.f32(Field::InitialPaddleHeight);
        for side in Side::BOTH {
            let paddle = paddles.get_mut(side);
            paddle.height = store
                .f32_opt(Field::PaddleHeight(side))
                .unwrap_or(initial_height);

            let mut input = store.f32(Field::PaddleInput(side));
            if store.flag(Field::Inverted(side)) {
                input = -input;
            }
            let direction = if input > 0.0 {
                1.0
            } else if input < 0.0 {
                -1.0
            } else {
                0.0
            };

            Self::step_paddle(
                paddle,
                direction,
                store.flag(Field::IceEffect(side)),
                store.flag(Field::SpeedBoost(side)),
            );
            store.set(Field::PaddleY(side), paddle.y);
        }
    }

    /// Advance one paddle by one tick
    pub fn step_paddle(paddle: &mut Paddle, direction: f32, on_ice: bool, boosted: bool) {
        if on_ice {
            if direction != 0.0 {
                paddle.velocity += direction * ICE_ACCELERATION;
            }
            paddle.velocity *= ICE_FRICTION;
        } else {
            let speed = if boosted {
                PADDLE_SPEED * SPEED_BOOST_FACTOR
            } else {
                PADDLE_SPEED
            };
            paddle.velocity = direction * speed;
        }

        let mut new_y = paddle.y + paddle.velocity;
        if new_y < FIELD_TOP {
            new_y = FIELD_TOP;
            paddle.velocity = 0.0;
        } else if new_y + paddle.height > FIELD_BOTTOM {
            new_y = FIELD_BOTTOM - paddle.height;
            paddle.velocity = 0.0;
        }
        paddle.y = new_y;
    }

    /// Integrate the ball one tick, or carry it on its paddle while stuck
    pub fn move_ball(store: &ScopedStore, paddles: &Paddles, ball: &mut Ball, now_ms: u64) {
        if store.flag(Field::BallStuck) {
            if let Some(side) = store.get(Field::BallStuckSide).and_then(|s| Side::parse(&s)) {
                Self::carry_stuck_ball(store, paddles.get(side), ball, now_ms);
                return;
            }
            tracing::warn!(match_id = %store.match_id(), "Stuck ball without a side, releasing");
            store.delete(Field::BallStuck);
        }
        ball.x += ball.vx;
        ball.y += ball.vy;
    }

    fn carry_stuck_ball(store: &ScopedStore, paddle: &Paddle, ball: &mut Ball, now_ms: u64) {
        let side = paddle.side;
        ball.x = paddle.contact_x(ball.radius);
        ball.y = paddle.y + store.f32(Field::StickyOffset(side));

        let stuck_at = store.u64(Field::StickyStartMs(side));
        if now_ms.saturating_sub(stuck_at) >= STICK_DURATION_MS {
            Self::release(store, side, ball);
        }
    }

    /// Attach the ball to a paddle; velocity stays frozen until release
    pub fn stick(store: &ScopedStore, paddle: &Paddle, ball: &mut Ball, now_ms: u64) {
        let side = paddle.side;
        store.set(Field::BallOriginalVx, ball.vx);
        store.set(Field::BallOriginalVy, ball.vy);
        store.set(Field::BallStuck, 1);
        store.set(Field::BallStuckSide, side);
        store.set(Field::StickyOffset(side), ball.y - paddle.y);
        store.set(Field::StickyStartMs(side), now_ms);
        ball.x = paddle.contact_x(ball.radius);
    }

    /// Let go of a stuck ball and arm the speed boost for its next rebound
    pub fn release(store: &ScopedStore, side: Side, ball: &mut Ball) {
        ball.vx = store.f32_opt(Field::BallOriginalVx).unwrap_or(MIN_SPEED);
        ball.vy = store.f32_opt(Field::BallOriginalVy).unwrap_or(MIN_SPEED);
        store.set(Field::BallBoostPending, 1);

        store.delete(Field::BallStuck);
        store.delete(Field::BallStuckSide);
        store.delete(Field::StickyOffset(side));
        store.delete(Field::StickyStartMs(side));
        store.delete(Field::BallOriginalVx);
        store.delete(Field::BallOriginalVy);
        store.delete(Field::Sticky(side));

        tracing::debug!(match_id = %store.match_id(), side = %side, "Ball released");
    }

    /// New velocity after touching a paddle
    pub fn rebound(store: &ScopedStore, paddle: &Paddle, ball: &mut Ball) {
        if store.flag(Field::BallBoostActive) {
            ball.vx = store.f32_opt(Field::BallVxBeforeBoost).unwrap_or(MIN_SPEED);
            ball.vy = store.f32_opt(Field::BallVyBeforeBoost).unwrap_or(MIN_SPEED);
            store.delete(Field::BallVxBeforeBoost);
            store.delete(Field::BallVyBeforeBoost);
            store.delete(Field::BallBoostActive);
        }

        let raw_speed = if store.flag(Field::BallBoostPending) {
            store.set(Field::BallVxBeforeBoost, ball.vx);
            store.set(Field::BallVyBeforeBoost, ball.vy);
            store.set(Field::BallBoostActive, 1);
            store.delete(Field::BallBoostPending);
            ball.speed() * BOOST_MULTIPLIER
        } else {
            ball.speed() + REBOUND_SPEEDUP
        };
        let speed = raw_speed.clamp(MIN_SPEED, MAX_SPEED);

        let relative = ((ball.y - paddle.center_y()) / (paddle.height / 2.0)).clamp(-1.0, 1.0);
        let angle = relative * FRAC_PI_4;

        let vx = speed * angle.cos();
        ball.vx = match paddle.side {
            Side::Left => vx,
            Side::Right => -vx,
        };
        ball.vy = speed * angle.sin();
    }

    /// Put the ball back at center with a random diagonal at tier speed
    pub fn reset_ball<R: Rng>(store: &ScopedStore, ball: &mut Ball, rng: &mut R) {
        let speed = store.f32(Field::InitialBallSpeed);

        ball.x = CENTER_X;
        ball.y = CENTER_Y;
        ball.vx = random_sign(rng) * speed;
        ball.vy = random_sign(rng) * speed;
        ball.last_toucher = None;

        for key in [
            Field::BallBoostPending,
            Field::BallBoostActive,
            Field::BallVxBeforeBoost,
            Field::BallVyBeforeBoost,
        ] {
            store.delete(key);
        }
        ball.save(store);
    }

    /// Circle overlap test (touching counts)
    pub fn circles_touch(ax: f32, ay: f32, ar: f32, bx: f32, by: f32, br: f32) -> bool {
        (ax - bx).hypot(ay - by) <= ar + br
    }
}

fn random_sign<R: Rng>(rng: &mut R) -> f32 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

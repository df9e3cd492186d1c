//! Border, bumper, orb and paddle collision resolution

use crate::store::{Field, ScopedStore};
use crate::ws::protocol::{BorderSide, Collision, EffectKind, Side};

use super::entities::{Ball, Bumper, Paddles, PowerUpOrb, FIELD_BOTTOM, FIELD_TOP};
use super::physics::PhysicsSystem;

/// What the paddle pass decided for this tick
#[derive(Debug, Clone, PartialEq)]
pub enum PaddleOutcome {
    /// Ball is in play and untouched
    None,
    /// Ball left the field; the given side scores
    Scored(Side),
    Bounced(Collision),
    Stuck(Side),
}

pub struct CollisionSystem;

impl CollisionSystem {
    /// Reflect off the top and bottom borders.
    /// Only a ball moving into a border is turned, so a second pass is a no-op.
    pub fn resolve_borders(ball: &mut Ball) -> Option<Collision> {
        let border = if ball.y - ball.radius <= FIELD_TOP && ball.vy < 0.0 {
            ball.vy = ball.vy.abs();
            BorderSide::Up
        } else if ball.y + ball.radius >= FIELD_BOTTOM && ball.vy > 0.0 {
            ball.vy = -ball.vy.abs();
            BorderSide::Down
        } else {
            return None;
        };

        Some(Collision::BorderCollision {
            border_side: border,
            coor_x_collision: ball.x,
        })
    }

    /// Re-aim the ball away from every bumper it touches, keeping its speed
    pub fn resolve_bumpers(ball: &mut Ball, bumpers: &[Bumper]) -> Vec<Collision> {
        let mut events = Vec::new();
        for bumper in bumpers.iter().filter(|b| b.active) {
            if !PhysicsSystem::circles_touch(
                ball.x,
                ball.y,
                ball.radius,
                bumper.x,
                bumper.y,
                bumper.radius(),
            ) {
                continue;
            }

            let angle = (ball.y - bumper.y).atan2(ball.x - bumper.x);
            let speed = ball.speed();
            ball.vx = speed * angle.cos();
            ball.vy = speed * angle.sin();

            events.push(Collision::BumperCollision {
                bumper_x: bumper.x,
                bumper_y: bumper.y,
                new_speed_x: ball.vx,
                new_speed_y: ball.vy,
            });
        }
        events
    }

    /// Live orbs the ball currently overlaps
    pub fn touched_orbs(ball: &Ball, orbs: &[PowerUpOrb]) -> Vec<EffectKind> {
        orbs.iter()
            .filter(|orb| orb.active)
            .filter(|orb| {
                PhysicsSystem::circles_touch(ball.x, ball.y, ball.radius, orb.x, orb.y, orb.radius())
            })
            .map(|orb| orb.kind)
            .collect()
    }

    /// Scoring boundaries and paddle contact. Skipped while the ball is stuck.
    pub fn resolve_paddles(
        store: &ScopedStore,
        paddles: &Paddles,
        ball: &mut Ball,
        now_ms: u64,
    ) -> PaddleOutcome {
        if store.flag(Field::BallStuck) {
            return PaddleOutcome::None;
        }

        let left = &paddles.left;
        let right = &paddles.right;

        if ball.x + ball.radius <= left.face_x() && !left.covers(ball.y) {
            return PaddleOutcome::Scored(Side::Right);
        }
        if ball.x - ball.radius >= right.face_x() && !right.covers(ball.y) {
            return PaddleOutcome::Scored(Side::Left);
        }

        let contact = if ball.vx < 0.0 && ball.x - ball.radius <= left.face_x() {
            Some(left)
        } else if ball.vx > 0.0 && ball.x + ball.radius >= right.face_x() {
            Some(right)
        } else {
            None
        };

        let Some(paddle) = contact.filter(|p| p.covers(ball.y)) else {
            return PaddleOutcome::None;
        };

        let side = paddle.side;
        ball.x = paddle.contact_x(ball.radius);
        ball.last_toucher = Some(side);

        if store.flag(Field::Sticky(side)) {
            PhysicsSystem::stick(store, paddle, ball, now_ms);
            return PaddleOutcome::Stuck(side);
        }

        PhysicsSystem::rebound(store, paddle, ball);
        PaddleOutcome::Bounced(Collision::PaddleCollision {
            paddle_side: side,
            new_speed_x: ball.vx,
            new_speed_y: ball.vy,
        })
    }
}

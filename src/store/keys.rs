//! Field names of the per-match state store
//!
//! Every mutable match field has exactly one variant here. Writers:
//! - transport: `PaddleInput`
//! - tick loop: paddle geometry, ball motion, stick/boost bookkeeping, scores,
//!   orb and bumper placement
//! - effect timers: paddle modifiers, `OriginalPaddleHeight`, `PaddleHeight`,
//!   `FlashEffect`

use std::fmt;

use crate::ws::protocol::{EffectKind, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Raw velocity requested by the client (-8, 0, +8)
    PaddleInput(Side),
    PaddleY(Side),
    PaddleHeight(Side),
    InitialPaddleHeight,
    /// Speed tier magnitude used on every respawn
    InitialBallSpeed,

    BallX,
    BallY,
    BallVx,
    BallVy,
    LastToucher,

    BallStuck,
    BallStuckSide,
    StickyOffset(Side),
    /// Match clock milliseconds when the ball attached
    StickyStartMs(Side),
    BallOriginalVx,
    BallOriginalVy,
    BallBoostPending,
    BallBoostActive,
    BallVxBeforeBoost,
    BallVyBeforeBoost,

    Score(Side),

    PowerUpActive(EffectKind),
    PowerUpX(EffectKind),
    PowerUpY(EffectKind),
    BumperActive(usize),
    BumperX(usize),
    BumperY(usize),

    Inverted(Side),
    IceEffect(Side),
    SpeedBoost(Side),
    Sticky(Side),
    OriginalPaddleHeight(Side),
    FlashEffect,
}

impl Field {
    /// Modifier keys wiped when a point is scored
    pub fn modifiers() -> impl Iterator<Item = Field> {
        Side::BOTH
            .into_iter()
            .flat_map(|side| {
                [
                    Field::Sticky(side),
                    Field::Inverted(side),
                    Field::IceEffect(side),
                    Field::SpeedBoost(side),
                ]
            })
            .chain(std::iter::once(Field::FlashEffect))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::PaddleInput(side) => write!(f, "paddle_{side}_velocity"),
            Field::PaddleY(side) => write!(f, "paddle_{side}_y"),
            Field::PaddleHeight(side) => write!(f, "paddle_{side}_height"),
            Field::InitialPaddleHeight => f.write_str("initial_paddle_height"),
            Field::InitialBallSpeed => f.write_str("initial_ball_speed_multiplier"),
            Field::BallX => f.write_str("ball_x"),
            Field::BallY => f.write_str("ball_y"),
            Field::BallVx => f.write_str("ball_vx"),
            Field::BallVy => f.write_str("ball_vy"),
            Field::LastToucher => f.write_str("ball_last_toucher"),
            Field::BallStuck => f.write_str("ball_stuck"),
            Field::BallStuckSide => f.write_str("ball_stuck_side"),
            Field::StickyOffset(side) => write!(f, "sticky_relative_pos_{side}"),
            Field::StickyStartMs(side) => write!(f, "sticky_start_time_{side}"),
            Field::BallOriginalVx => f.write_str("ball_original_vx"),
            Field::BallOriginalVy => f.write_str("ball_original_vy"),
            Field::BallBoostPending => f.write_str("ball_speed_boosted"),
            Field::BallBoostActive => f.write_str("ball_speed_already_boosted"),
            Field::BallVxBeforeBoost => f.write_str("ball_speed_x_before_boost"),
            Field::BallVyBeforeBoost => f.write_str("ball_speed_y_before_boost"),
            Field::Score(side) => write!(f, "score_{side}"),
            Field::PowerUpActive(kind) => write!(f, "powerup_{kind}_active"),
            Field::PowerUpX(kind) => write!(f, "powerup_{kind}_x"),
            Field::PowerUpY(kind) => write!(f, "powerup_{kind}_y"),
            Field::BumperActive(slot) => write!(f, "bumper_{slot}_active"),
            Field::BumperX(slot) => write!(f, "bumper_{slot}_x"),
            Field::BumperY(slot) => write!(f, "bumper_{slot}_y"),
            Field::Inverted(side) => write!(f, "paddle_{side}_inverted"),
            Field::IceEffect(side) => write!(f, "paddle_{side}_ice_effect"),
            Field::SpeedBoost(side) => write!(f, "paddle_{side}_speed_boost"),
            Field::Sticky(side) => write!(f, "paddle_{side}_sticky"),
            Field::OriginalPaddleHeight(side) => write!(f, "paddle_{side}_original_height"),
            Field::FlashEffect => f.write_str("flash_effect"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_stable() {
        assert_eq!(Field::PaddleInput(Side::Left).to_string(), "paddle_left_velocity");
        assert_eq!(Field::PowerUpActive(EffectKind::Ice).to_string(), "powerup_ice_active");
        assert_eq!(Field::BumperX(2).to_string(), "bumper_2_x");
        assert_eq!(Field::StickyOffset(Side::Right).to_string(), "sticky_relative_pos_right");
    }

    #[test]
    fn modifier_set_covers_both_sides_and_flash() {
        let all: Vec<_> = Field::modifiers().collect();
        assert_eq!(all.len(), 9);
        assert!(all.contains(&Field::IceEffect(Side::Right)));
        assert!(all.contains(&Field::FlashEffect));
    }
}

//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Paddle side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn parse(raw: &str) -> Option<Side> {
        match raw {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paddle move direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// Power-up effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Opponent controls are reversed
    Invert,
    /// Opponent paddle is halved
    Shrink,
    /// Opponent paddle slides
    Ice,
    /// Own paddle moves faster
    Speed,
    /// Board flashes
    Flash,
    /// Ball sticks to own paddle on contact
    Sticky,
}

impl EffectKind {
    pub const ALL: [EffectKind; 6] = [
        EffectKind::Invert,
        EffectKind::Shrink,
        EffectKind::Ice,
        EffectKind::Speed,
        EffectKind::Flash,
        EffectKind::Sticky,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::Invert => "invert",
            EffectKind::Shrink => "shrink",
            EffectKind::Ice => "ice",
            EffectKind::Speed => "speed",
            EffectKind::Flash => "flash",
            EffectKind::Sticky => "sticky",
        }
    }

    /// Orb color shown to clients
    pub fn color(self) -> [u8; 3] {
        match self {
            EffectKind::Invert => [255, 105, 180],
            EffectKind::Shrink => [255, 0, 0],
            EffectKind::Ice => [0, 255, 255],
            EffectKind::Speed => [255, 215, 0],
            EffectKind::Flash => [255, 255, 0],
            EffectKind::Sticky => [50, 205, 50],
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Start moving a paddle
    StartMove { player: Side, direction: Direction },

    /// Stop moving a paddle
    StopMove { player: Side },
}

impl ClientMsg {
    /// Parse a raw text frame; anything malformed or out of range is `None`
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full match state, once per tick
    GameState(GameStateSnapshot),

    /// Pre-match countdown step
    Countdown { countdown_nb: u32 },

    /// A point was scored
    Scored {
        #[serde(rename = "scoreMsg")]
        score_msg: String,
    },

    PowerupSpawned { powerup: PowerUpView },

    PowerupApplied {
        player: Side,
        effect: EffectKind,
        /// Effect duration in seconds
        duration: f32,
    },

    PowerupExpired { powerup: PowerUpMarker },

    BumperSpawned { bumper: BumperMarker },

    BumperExpired { bumper: BumperMarker },

    CollisionEvent { collision: Collision },

    /// Match finished normally
    GameOver {
        tournament_id: Option<Uuid>,
        winner: String,
        loser: String,
    },

    /// Match cancelled or failed
    GameAborted,
}

/// Per-tick state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_size: f32,
    pub ball_speed_x: f32,
    pub ball_speed_y: f32,
    pub paddle_left_y: f32,
    pub paddle_right_y: f32,
    pub paddle_width: f32,
    pub paddle_left_height: f32,
    pub paddle_right_height: f32,
    pub score_left: u32,
    pub score_right: u32,
    pub powerups: Vec<PowerUpView>,
    pub bumpers: Vec<BumperView>,
    pub flash_effect: bool,
}

/// Live power-up orb
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpView {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
    pub color: [u8; 3],
}

/// Where an orb was when it went away
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerUpMarker {
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
}

/// Live bumper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumperView {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumperMarker {
    pub x: f32,
    pub y: f32,
}

/// Field border hit by the ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderSide {
    Up,
    Down,
}

/// Collision notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Collision {
    PaddleCollision {
        paddle_side: Side,
        new_speed_x: f32,
        new_speed_y: f32,
    },
    BorderCollision {
        border_side: BorderSide,
        coor_x_collision: f32,
    },
    BumperCollision {
        bumper_x: f32,
        bumper_y: f32,
        new_speed_x: f32,
        new_speed_y: f32,
    },
}

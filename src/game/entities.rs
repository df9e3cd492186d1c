//! Field geometry and the in-memory views of paddles, ball, orbs and bumpers

use std::time::Duration;

use tokio::time::Instant;

use crate::store::{Field, ScopedStore};
use crate::ws::protocol::{BumperMarker, BumperView, EffectKind, PowerUpMarker, PowerUpView, Side};

// Field
pub const FIELD_WIDTH: f32 = 800.0;
pub const FIELD_TOP: f32 = 50.0;
pub const FIELD_BOTTOM: f32 = 350.0;
pub const FIELD_HEIGHT: f32 = FIELD_BOTTOM - FIELD_TOP;
pub const CENTER_X: f32 = FIELD_WIDTH / 2.0;
pub const CENTER_Y: f32 = FIELD_TOP + FIELD_HEIGHT / 2.0;

// Paddles
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PADDLE_SPEED: f32 = 8.0;
pub const LEFT_PADDLE_X: f32 = 50.0;
pub const RIGHT_PADDLE_X: f32 = 750.0;
pub const SPEED_BOOST_FACTOR: f32 = 1.5;
pub const ICE_ACCELERATION: f32 = 0.5;
pub const ICE_FRICTION: f32 = 0.98;

// Ball
pub const BALL_RADIUS: f32 = 7.0;
pub const MIN_SPEED: f32 = 1.0;
pub const MAX_SPEED: f32 = 20.0;
pub const REBOUND_SPEEDUP: f32 = 0.3;
pub const BOOST_MULTIPLIER: f32 = 2.0;
pub const STICK_DURATION_MS: u64 = 1_000;

// Orbs and bumpers
pub const ORB_RADIUS: f32 = 15.0;
pub const ORB_LIFETIME: Duration = Duration::from_secs(10);
pub const EFFECT_DURATION: Duration = Duration::from_secs(5);
pub const FLASH_DURATION: Duration = Duration::from_millis(300);
pub const BUMPER_RADIUS: f32 = 20.0;
pub const BUMPER_LIFETIME: Duration = Duration::from_secs(10);
pub const BUMPER_SLOTS: usize = 3;
pub const BUMPER_COLOR: [u8; 3] = [255, 255, 255];

/// A paddle; only `velocity` lives outside the store (ice momentum)
#[derive(Debug, Clone)]
pub struct Paddle {
    pub side: Side,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub velocity: f32,
}

impl Paddle {
    pub fn new(side: Side, height: f32) -> Self {
        let x = match side {
            Side::Left => LEFT_PADDLE_X,
            Side::Right => RIGHT_PADDLE_X,
        };
        Self {
            side,
            x,
            y: CENTER_Y - height / 2.0,
            width: PADDLE_WIDTH,
            height,
            velocity: 0.0,
        }
    }

    /// X coordinate the ball rebounds from
    pub fn face_x(&self) -> f32 {
        match self.side {
            Side::Left => self.x + self.width,
            Side::Right => self.x - self.width,
        }
    }

    /// Ball center x when resting against the face
    pub fn contact_x(&self, radius: f32) -> f32 {
        match self.side {
            Side::Left => self.face_x() + radius,
            Side::Right => self.face_x() - radius,
        }
    }

    /// Inclusive vertical span test
    pub fn covers(&self, y: f32) -> bool {
        self.y <= y && y <= self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Both paddles, addressable by side
#[derive(Debug, Clone)]
pub struct Paddles {
    pub left: Paddle,
    pub right: Paddle,
}

impl Paddles {
    pub fn new(height: f32) -> Self {
        Self {
            left: Paddle::new(Side::Left, height),
            right: Paddle::new(Side::Right, height),
        }
    }

    pub fn get(&self, side: Side) -> &Paddle {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut Paddle {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub last_toucher: Option<Side>,
}

impl Ball {
    pub fn new(x: f32, y: f32, vx: f32, vy: f32) -> Self {
        Self {
            x,
            y,
            vx,
            vy,
            radius: BALL_RADIUS,
            last_toucher: None,
        }
    }

    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }

    pub fn save(&self, store: &ScopedStore) {
        store.set(Field::BallX, self.x);
        store.set(Field::BallY, self.y);
        store.set(Field::BallVx, self.vx);
        store.set(Field::BallVy, self.vy);
        match self.last_toucher {
            Some(side) => store.set(Field::LastToucher, side),
            None => store.delete(Field::LastToucher),
        }
    }
}

/// One power-up per effect kind
#[derive(Debug, Clone)]
pub struct PowerUpOrb {
    pub kind: EffectKind,
    pub x: f32,
    pub y: f32,
    pub active: bool,
    pub spawned_at: Option<Instant>,
    pub cooldown_until: Option<Instant>,
}

impl PowerUpOrb {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            x: 0.0,
            y: 0.0,
            active: false,
            spawned_at: None,
            cooldown_until: None,
        }
    }

    pub fn radius(&self) -> f32 {
        ORB_RADIUS
    }

    pub fn effect_duration(&self) -> Duration {
        effect_duration(self.kind)
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.map(|end| now < end).unwrap_or(false)
    }

    pub fn can_spawn(&self, now: Instant) -> bool {
        !self.active && !self.in_cooldown(now)
    }

    pub fn activate(&mut self, x: f32, y: f32, now: Instant) {
        self.x = x;
        self.y = y;
        self.active = true;
        self.spawned_at = Some(now);
    }

    /// Take the orb off the field and start its cooldown
    pub fn deactivate(&mut self, now: Instant) {
        self.active = false;
        self.spawned_at = None;
        self.cooldown_until = Some(now + ORB_LIFETIME + self.effect_duration());
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.active
            && self
                .spawned_at
                .map(|at| now.duration_since(at) >= ORB_LIFETIME)
                .unwrap_or(false)
    }

    pub fn view(&self) -> PowerUpView {
        PowerUpView {
            kind: self.kind,
            x: self.x,
            y: self.y,
            color: self.kind.color(),
        }
    }

    pub fn marker(&self) -> PowerUpMarker {
        PowerUpMarker {
            kind: self.kind,
            x: self.x,
            y: self.y,
        }
    }
}

/// How long an effect stays applied
pub fn effect_duration(kind: EffectKind) -> Duration {
    match kind {
        EffectKind::Flash => FLASH_DURATION,
        _ => EFFECT_DURATION,
    }
}

#[derive(Debug, Clone)]
pub struct Bumper {
    pub slot: usize,
    pub x: f32,
    pub y: f32,
    pub active: bool,
    pub spawned_at: Option<Instant>,
}

impl Bumper {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            x: 0.0,
            y: 0.0,
            active: false,
            spawned_at: None,
        }
    }

    pub fn radius(&self) -> f32 {
        BUMPER_RADIUS
    }

    pub fn activate(&mut self, x: f32, y: f32, now: Instant) {
        self.x = x;
        self.y = y;
        self.active = true;
        self.spawned_at = Some(now);
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.spawned_at = None;
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.active
            && self
                .spawned_at
                .map(|at| now.duration_since(at) >= BUMPER_LIFETIME)
                .unwrap_or(false)
    }

    pub fn view(&self) -> BumperView {
        BumperView {
            x: self.x,
            y: self.y,
            size: BUMPER_RADIUS,
            color: BUMPER_COLOR,
        }
    }

    pub fn marker(&self) -> BumperMarker {
        BumperMarker {
            x: self.x,
            y: self.y,
        }
    }
}

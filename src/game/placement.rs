//! Spawn placement for orbs and bumpers

use rand::Rng;

use super::entities::{CENTER_X, CENTER_Y, FIELD_HEIGHT, FIELD_TOP, FIELD_WIDTH};

/// Minimum distance between any two live field objects
pub const MIN_DISTANCE: f32 = 40.0;
pub const MAX_ATTEMPTS: usize = 100;
/// Orbs keep this horizontal gap from the center line
pub const ORB_CENTER_GAP: f32 = 50.0;
/// Bumpers keep this radial gap from the exact center
pub const BUMPER_CENTER_GAP: f32 = 30.0;

/// Rectangle objects may appear in
#[derive(Debug, Clone, Copy)]
pub struct SpawnArea {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl SpawnArea {
    /// x 25%-75%, y 10%-90% of the field
    pub fn central() -> Self {
        Self {
            left: FIELD_WIDTH * 0.25,
            right: FIELD_WIDTH * 0.75,
            top: FIELD_TOP + FIELD_HEIGHT * 0.1,
            bottom: FIELD_TOP + FIELD_HEIGHT * 0.9,
        }
    }
}

/// Keep-out zone around the field center
#[derive(Debug, Clone, Copy)]
pub enum CenterRule {
    Horizontal(f32),
    Radial(f32),
}

impl CenterRule {
    fn rejects(self, x: f32, y: f32) -> bool {
        match self {
            CenterRule::Horizontal(gap) => (x - CENTER_X).abs() < gap,
            CenterRule::Radial(gap) => (x - CENTER_X).hypot(y - CENTER_Y) < gap,
        }
    }
}

/// Try up to `MAX_ATTEMPTS` random points, returning the first one clear of
/// the center rule and at least `MIN_DISTANCE` from every occupied point.
pub fn find_spawn_position<R: Rng>(
    rng: &mut R,
    area: SpawnArea,
    occupied: &[(f32, f32)],
    rule: CenterRule,
) -> Option<(f32, f32)> {
    (0..MAX_ATTEMPTS).find_map(|_| {
        let x = rng.gen_range(area.left..=area.right);
        let y = rng.gen_range(area.top..=area.bottom);

        if rule.rejects(x, y) {
            return None;
        }
        let clear = occupied
            .iter()
            .all(|&(ox, oy)| (x - ox).hypot(y - oy) >= MIN_DISTANCE);
        clear.then_some((x, y))
    })
}

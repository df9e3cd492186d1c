//! Spawning, pickup, expiry and reset of orbs, bumpers and paddle modifiers

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::store::directory::MatchParameters;
use crate::store::{Field, ScopedStore};
use crate::ws::protocol::{EffectKind, ServerMsg, Side};

use super::effects::EffectTable;
use super::entities::{Bumper, PowerUpOrb, BUMPER_SLOTS};
use super::placement::{
    find_spawn_position, CenterRule, SpawnArea, BUMPER_CENTER_GAP, ORB_CENTER_GAP,
};
use super::supervisor::MatchSupervisor;

pub const ORB_SPAWN_INTERVAL: Duration = Duration::from_secs(8);
pub const BUMPER_SPAWN_INTERVAL: Duration = Duration::from_secs(5);
pub const MAX_ACTIVE_ORBS: usize = 2;
pub const MAX_ACTIVE_BUMPERS: usize = 3;

/// Spawn interval clock. The first check arms it; only a successful spawn
/// restarts it.
#[derive(Debug, Clone)]
pub struct SpawnClock {
    interval: Duration,
    last: Option<Instant>,
}

impl SpawnClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                false
            }
            Some(last) => now.duration_since(last) >= self.interval,
        }
    }

    pub fn restart(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// Field objects and timed effects of one match
pub struct EffectManager {
    store: ScopedStore,
    effects: EffectTable,
    orbs: Vec<PowerUpOrb>,
    bumpers: Vec<Bumper>,
    orb_clock: SpawnClock,
    bumper_clock: SpawnClock,
    bonus_enabled: bool,
    obstacles_enabled: bool,
}

impl EffectManager {
    pub fn new(store: ScopedStore, parameters: &MatchParameters) -> Self {
        Self {
            store,
            effects: EffectTable::new(),
            orbs: EffectKind::ALL.into_iter().map(PowerUpOrb::new).collect(),
            bumpers: (0..BUMPER_SLOTS).map(Bumper::new).collect(),
            orb_clock: SpawnClock::new(ORB_SPAWN_INTERVAL),
            bumper_clock: SpawnClock::new(BUMPER_SPAWN_INTERVAL),
            bonus_enabled: parameters.bonus_enabled,
            obstacles_enabled: parameters.obstacles_enabled,
        }
    }

    pub fn orbs(&self) -> &[PowerUpOrb] {
        &self.orbs
    }

    pub fn bumpers(&self) -> &[Bumper] {
        &self.bumpers
    }

    #[cfg(test)]
    pub(crate) fn activate_orb(&mut self, kind: EffectKind, x: f32, y: f32, now: Instant) {
        if let Some(orb) = self.orbs.iter_mut().find(|o| o.kind == kind) {
            orb.activate(x, y, now);
        }
    }

    /// Spawn and expiry passes for the enabled object kinds
    pub fn update<R: Rng>(&mut self, rng: &mut R, now: Instant) -> Vec<ServerMsg> {
        let mut events = Vec::new();
        if self.bonus_enabled {
            events.extend(self.spawn_orb(rng, now));
            events.extend(self.expire_orbs(now));
        }
        if self.obstacles_enabled {
            events.extend(self.spawn_bumper(rng, now));
            events.extend(self.expire_bumpers(now));
        }
        events
    }

    fn occupied(&self) -> Vec<(f32, f32)> {
        self.orbs
            .iter()
            .filter(|o| o.active)
            .map(|o| (o.x, o.y))
            .chain(self.bumpers.iter().filter(|b| b.active).map(|b| (b.x, b.y)))
            .collect()
    }

    pub fn spawn_orb<R: Rng>(&mut self, rng: &mut R, now: Instant) -> Option<ServerMsg> {
        if !self.orb_clock.due(now) {
            return None;
        }
        if self.orbs.iter().filter(|o| o.active).count() >= MAX_ACTIVE_ORBS {
            return None;
        }

        let eligible: Vec<usize> = (0..self.orbs.len())
            .filter(|&i| self.orbs[i].can_spawn(now))
            .collect();
        let &index = eligible.choose(rng)?;

        let occupied = self.occupied();
        let (x, y) = find_spawn_position(
            rng,
            SpawnArea::central(),
            &occupied,
            CenterRule::Horizontal(ORB_CENTER_GAP),
        )?;

        let orb = &mut self.orbs[index];
        orb.activate(x, y, now);
        self.store.set(Field::PowerUpActive(orb.kind), 1);
        self.store.set(Field::PowerUpX(orb.kind), x);
        self.store.set(Field::PowerUpY(orb.kind), y);
        self.orb_clock.restart(now);

        debug!(match_id = %self.store.match_id(), kind = %orb.kind, x, y, "Power-up spawned");
        Some(ServerMsg::PowerupSpawned { powerup: orb.view() })
    }

    pub fn spawn_bumper<R: Rng>(&mut self, rng: &mut R, now: Instant) -> Option<ServerMsg> {
        if !self.bumper_clock.due(now) {
            return None;
        }
        if self.bumpers.iter().filter(|b| b.active).count() >= MAX_ACTIVE_BUMPERS {
            return None;
        }

        let idle: Vec<usize> = (0..self.bumpers.len())
            .filter(|&i| !self.bumpers[i].active)
            .collect();
        let &index = idle.choose(rng)?;

        let occupied = self.occupied();
        let (x, y) = find_spawn_position(
            rng,
            SpawnArea::central(),
            &occupied,
            CenterRule::Radial(BUMPER_CENTER_GAP),
        )?;

        let bumper = &mut self.bumpers[index];
        bumper.activate(x, y, now);
        self.store.set(Field::BumperActive(bumper.slot), 1);
        self.store.set(Field::BumperX(bumper.slot), x);
        self.store.set(Field::BumperY(bumper.slot), y);
        self.bumper_clock.restart(now);

        debug!(match_id = %self.store.match_id(), slot = bumper.slot, x, y, "Bumper spawned");
        Some(ServerMsg::BumperSpawned {
            bumper: bumper.marker(),
        })
    }

    fn remove_orb(&mut self, index: usize, now: Instant) -> ServerMsg {
        let orb = &mut self.orbs[index];
        let marker = orb.marker();
        orb.deactivate(now);
        self.store.delete(Field::PowerUpActive(orb.kind));
        self.store.delete(Field::PowerUpX(orb.kind));
        self.store.delete(Field::PowerUpY(orb.kind));
        ServerMsg::PowerupExpired { powerup: marker }
    }

    fn remove_bumper(&mut self, index: usize) -> ServerMsg {
        let bumper = &mut self.bumpers[index];
        let marker = bumper.marker();
        bumper.deactivate();
        self.store.delete(Field::BumperActive(bumper.slot));
        self.store.delete(Field::BumperX(bumper.slot));
        self.store.delete(Field::BumperY(bumper.slot));
        ServerMsg::BumperExpired { bumper: marker }
    }

    pub fn expire_orbs(&mut self, now: Instant) -> Vec<ServerMsg> {
        (0..self.orbs.len())
            .filter(|&i| self.orbs[i].expired(now))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|i| self.remove_orb(i, now))
            .collect()
    }

    pub fn expire_bumpers(&mut self, now: Instant) -> Vec<ServerMsg> {
        (0..self.bumpers.len())
            .filter(|&i| self.bumpers[i].expired(now))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|i| self.remove_bumper(i))
            .collect()
    }

    /// Ball touched an orb. Without a last toucher nothing happens.
    /// Otherwise the orb leaves the field, the effect is applied now and a
    /// supervised timer reverts it.
    pub fn pickup(
        &mut self,
        kind: EffectKind,
        picker: Option<Side>,
        now: Instant,
        supervisor: &MatchSupervisor,
    ) -> Option<ServerMsg> {
        let picker = picker?;
        let index = self.orbs.iter().position(|o| o.kind == kind && o.active)?;
        let effect = self.effects.get(kind)?;

        let orb = &mut self.orbs[index];
        orb.deactivate(now);
        self.store.delete(Field::PowerUpActive(kind));
        self.store.delete(Field::PowerUpX(kind));
        self.store.delete(Field::PowerUpY(kind));

        effect.apply(&self.store, picker);
        let duration = effect.duration();

        let store = self.store.clone();
        let registered = supervisor.spawn_timer(async move {
            tokio::time::sleep(duration).await;
            effect.revert(&store, picker);
        });
        if !registered {
            warn!(match_id = %self.store.match_id(), kind = %kind, "Effect timer refused, match is stopping");
        }

        debug!(match_id = %self.store.match_id(), kind = %kind, player = %picker, "Power-up applied");
        Some(ServerMsg::PowerupApplied {
            player: picker,
            effect: kind,
            duration: duration.as_secs_f32(),
        })
    }

    /// Back to baseline after a point: objects off the field, modifiers
    /// cleared, heights restored and pending reverts dropped.
    pub fn reset_all(&mut self, now: Instant, supervisor: &MatchSupervisor) -> Vec<ServerMsg> {
        supervisor.abort_timers();

        let mut events = Vec::new();
        for i in 0..self.orbs.len() {
            if self.orbs[i].active {
                events.push(self.remove_orb(i, now));
            }
        }
        for i in 0..self.bumpers.len() {
            if self.bumpers[i].active {
                events.push(self.remove_bumper(i));
            }
        }

        for key in Field::modifiers() {
            self.store.delete(key);
        }
        let initial_height = self.store.f32(Field::InitialPaddleHeight);
        for side in Side::BOTH {
            self.store.delete(Field::OriginalPaddleHeight(side));
            self.store.set(Field::PaddleHeight(side), initial_height);
        }
        events
    }
}

//! Timed status effects granted by power-up orbs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{Field, ScopedStore};
use crate::ws::protocol::{EffectKind, Side};

use super::entities::effect_duration;

/// Apply/revert pair for one effect kind.
/// `picker` is the side credited with the pickup.
pub trait StatusEffect: Send + Sync {
    fn kind(&self) -> EffectKind;

    fn apply(&self, store: &ScopedStore, picker: Side);

    fn revert(&self, store: &ScopedStore, picker: Side);

    fn duration(&self) -> Duration {
        effect_duration(self.kind())
    }
}

/// Halves the opponent paddle
pub struct Shrink;

impl StatusEffect for Shrink {
    fn kind(&self) -> EffectKind {
        EffectKind::Shrink
    }

    fn apply(&self, store: &ScopedStore, picker: Side) {
        let target = picker.opponent();
        let current = store
            .f32_opt(Field::PaddleHeight(target))
            .unwrap_or_else(|| store.f32(Field::InitialPaddleHeight));
        if store.get(Field::OriginalPaddleHeight(target)).is_none() {
            store.set(Field::OriginalPaddleHeight(target), current);
        }
        store.set(Field::PaddleHeight(target), current * 0.5);
    }

    fn revert(&self, store: &ScopedStore, picker: Side) {
        let target = picker.opponent();
        let original = store
            .f32_opt(Field::OriginalPaddleHeight(target))
            .unwrap_or_else(|| store.f32(Field::InitialPaddleHeight));
        store.set(Field::PaddleHeight(target), original);
        store.delete(Field::OriginalPaddleHeight(target));
    }
}

/// Modifier flag on one paddle
pub struct PaddleFlag {
    kind: EffectKind,
    field: fn(Side) -> Field,
    on_opponent: bool,
}

impl PaddleFlag {
    fn target(&self, picker: Side) -> Side {
        if self.on_opponent {
            picker.opponent()
        } else {
            picker
        }
    }
}

impl StatusEffect for PaddleFlag {
    fn kind(&self) -> EffectKind {
        self.kind
    }

    fn apply(&self, store: &ScopedStore, picker: Side) {
        store.set_flag((self.field)(self.target(picker)), true);
    }

    fn revert(&self, store: &ScopedStore, picker: Side) {
        store.set_flag((self.field)(self.target(picker)), false);
    }
}

/// Board-wide flash
pub struct Flash;

impl StatusEffect for Flash {
    fn kind(&self) -> EffectKind {
        EffectKind::Flash
    }

    fn apply(&self, store: &ScopedStore, _picker: Side) {
        store.set_flag(Field::FlashEffect, true);
    }

    fn revert(&self, store: &ScopedStore, _picker: Side) {
        store.set_flag(Field::FlashEffect, false);
    }
}

/// Per-kind effect dispatch
#[derive(Clone)]
pub struct EffectTable {
    effects: HashMap<EffectKind, Arc<dyn StatusEffect>>,
}

impl Default for EffectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectTable {
    pub fn new() -> Self {
        let mut table = Self {
            effects: HashMap::new(),
        };
        table.register(Arc::new(Shrink));
        table.register(Arc::new(Flash));
        table.register(Arc::new(PaddleFlag {
            kind: EffectKind::Speed,
            field: Field::SpeedBoost,
            on_opponent: false,
        }));
        table.register(Arc::new(PaddleFlag {
            kind: EffectKind::Sticky,
            field: Field::Sticky,
            on_opponent: false,
        }));
        table.register(Arc::new(PaddleFlag {
            kind: EffectKind::Ice,
            field: Field::IceEffect,
            on_opponent: true,
        }));
        table.register(Arc::new(PaddleFlag {
            kind: EffectKind::Invert,
            field: Field::Inverted,
            on_opponent: true,
        }));
        table
    }

    pub fn register(&mut self, effect: Arc<dyn StatusEffect>) {
        self.effects.insert(effect.kind(), effect);
    }

    pub fn get(&self, kind: EffectKind) -> Option<Arc<dyn StatusEffect>> {
        self.effects.get(&kind).cloned()
    }
}

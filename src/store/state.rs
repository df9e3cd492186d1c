//! Ephemeral per-match key/value state
//!
//! Values are stored as text. A missing or unparseable value reads as zero
//! or false, so a bad write is repaired by the next one instead of failing
//! the reader.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use super::keys::Field;

/// Shared store for all running matches, partitioned by match id
#[derive(Clone, Default)]
pub struct StateStore {
    matches: Arc<DashMap<Uuid, HashMap<String, String>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, match_id: Uuid, key: Field, value: impl Display) {
        self.matches
            .entry(match_id)
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Overwrite a field only while the match still has state.
    /// Returns false once the match has been cleared.
    pub fn update(&self, match_id: Uuid, key: Field, value: impl Display) -> bool {
        match self.matches.get_mut(&match_id) {
            Some(mut fields) => {
                fields.insert(key.to_string(), value.to_string());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, match_id: Uuid, key: Field) -> Option<String> {
        self.matches
            .get(&match_id)
            .and_then(|fields| fields.get(&key.to_string()).cloned())
    }

    pub fn delete(&self, match_id: Uuid, key: Field) {
        if let Some(mut fields) = self.matches.get_mut(&match_id) {
            fields.remove(&key.to_string());
        }
    }

    /// Drop every key ever written for the match
    pub fn clear(&self, match_id: Uuid) {
        self.matches.remove(&match_id);
    }

    pub fn key_count(&self, match_id: Uuid) -> usize {
        self.matches
            .get(&match_id)
            .map(|fields| fields.len())
            .unwrap_or(0)
    }

    /// Handle bound to a single match
    pub fn scoped(&self, match_id: Uuid) -> ScopedStore {
        ScopedStore {
            store: self.clone(),
            match_id,
        }
    }
}

/// Typed view of one match's fields
#[derive(Clone)]
pub struct ScopedStore {
    store: StateStore,
    match_id: Uuid,
}

impl ScopedStore {
    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn set(&self, key: Field, value: impl Display) {
        self.store.set(self.match_id, key, value);
    }

    pub fn update(&self, key: Field, value: impl Display) -> bool {
        self.store.update(self.match_id, key, value)
    }

    pub fn get(&self, key: Field) -> Option<String> {
        self.store.get(self.match_id, key)
    }

    pub fn delete(&self, key: Field) {
        self.store.delete(self.match_id, key);
    }

    pub fn clear(&self) {
        self.store.clear(self.match_id);
    }

    pub fn key_count(&self) -> usize {
        self.store.key_count(self.match_id)
    }

    pub fn f32_opt(&self, key: Field) -> Option<f32> {
        self.get(key).and_then(|raw| raw.trim().parse().ok())
    }

    pub fn f32(&self, key: Field) -> f32 {
        self.f32_opt(key).unwrap_or(0.0)
    }

    pub fn u32(&self, key: Field) -> u32 {
        self.get(key)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn u64(&self, key: Field) -> u64 {
        self.get(key)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn flag(&self, key: Field) -> bool {
        matches!(self.get(key).as_deref(), Some("1") | Some("true"))
    }

    /// `true` writes the flag, `false` removes it
    pub fn set_flag(&self, key: Field, on: bool) {
        if on {
            self.set(key, 1);
        } else {
            self.delete(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::Side;

    #[test]
    fn absent_and_garbage_read_as_zero() {
        let store = StateStore::new();
        let scoped = store.scoped(Uuid::new_v4());

        assert_eq!(scoped.f32(Field::BallX), 0.0);
        assert!(!scoped.flag(Field::BallStuck));

        scoped.set(Field::BallX, "not-a-number");
        assert_eq!(scoped.f32(Field::BallX), 0.0);
        assert_eq!(scoped.f32_opt(Field::BallX), None);
    }

    #[test]
    fn matches_are_isolated() {
        let store = StateStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store.set(a, Field::Score(Side::Left), 2);
        store.set(b, Field::Score(Side::Left), 1);
        store.clear(a);

        assert_eq!(store.key_count(a), 0);
        assert_eq!(store.get(b, Field::Score(Side::Left)).as_deref(), Some("1"));
    }

    #[test]
    fn flags_toggle_by_presence() {
        let store = StateStore::new();
        let scoped = store.scoped(Uuid::new_v4());

        scoped.set_flag(Field::Inverted(Side::Right), true);
        assert!(scoped.flag(Field::Inverted(Side::Right)));
        scoped.set_flag(Field::Inverted(Side::Right), false);
        assert_eq!(scoped.key_count(), 0);
    }

    #[test]
    fn update_never_recreates_cleared_match() {
        let store = StateStore::new();
        let scoped = store.scoped(Uuid::new_v4());

        assert!(!scoped.update(Field::BallX, 1.0));
        assert_eq!(scoped.key_count(), 0);

        scoped.set(Field::BallX, 400.0);
        assert!(scoped.update(Field::BallX, 410.0));
        assert_eq!(scoped.f32(Field::BallX), 410.0);

        scoped.clear();
        assert!(!scoped.update(Field::BallX, 420.0));
        assert_eq!(scoped.key_count(), 0);
    }
}

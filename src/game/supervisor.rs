//! Per-match task supervision and the registry of live matches

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// Outbound channel capacity per match
const EVENT_CAPACITY: usize = 256;

/// Owns everything a single match spawns: the cancel signal, effect timers,
/// the outbound event channel and the client connection count.
pub struct MatchSupervisor {
    match_id: Uuid,
    cancel_tx: watch::Sender<bool>,
    timers: Mutex<JoinSet<()>>,
    events: broadcast::Sender<ServerMsg>,
    connections: AtomicUsize,
    started: AtomicBool,
}

impl MatchSupervisor {
    pub fn new(match_id: Uuid) -> Arc<Self> {
        let (cancel_tx, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            match_id,
            cancel_tx,
            timers: Mutex::new(JoinSet::new()),
            events,
            connections: AtomicUsize::new(0),
            started: AtomicBool::new(false),
        })
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn events(&self) -> broadcast::Sender<ServerMsg> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events.subscribe()
    }

    /// Claim the right to run the match loop; false if already claimed
    pub fn mark_started(&self) -> bool {
        !self.started.swap(true, Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Register a timer task. Refused once the match is cancelled.
    pub fn spawn_timer<F>(&self, timer: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut timers = self.timers.lock();
        if self.is_cancelled() {
            return false;
        }
        while timers.try_join_next().is_some() {}
        timers.spawn(timer);
        true
    }

    /// Abort live timers without cancelling the match
    pub fn abort_timers(&self) {
        self.timers.lock().abort_all();
    }

    /// Stop the loop and every registered timer. Safe to call repeatedly.
    pub fn cancel(&self) {
        let first = !self.cancel_tx.send_replace(true);
        self.timers.lock().abort_all();
        if first {
            debug!(match_id = %self.match_id, "Match cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        // the sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Timers that have not finished yet
    pub fn active_timers(&self) -> usize {
        let mut timers = self.timers.lock();
        while timers.try_join_next().is_some() {}
        timers.len()
    }

    /// Abort and wait for every timer task to end
    pub async fn join_timers(&self) {
        let mut timers = std::mem::take(&mut *self.timers.lock());
        timers.abort_all();
        while timers.join_next().await.is_some() {}
    }

    pub fn connect(&self) -> usize {
        self.connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the number of connections left
    pub fn disconnect(&self) -> usize {
        let previous = self
            .connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Registry of all live matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, Arc<MatchSupervisor>>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<MatchSupervisor>> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    /// Existing supervisor for the match, or a fresh one
    pub fn get_or_create(&self, id: Uuid) -> Arc<MatchSupervisor> {
        self.matches
            .entry(id)
            .or_insert_with(|| MatchSupervisor::new(id))
            .value()
            .clone()
    }

    /// Remove the entry only if it still holds this supervisor
    pub fn remove(&self, supervisor: &Arc<MatchSupervisor>) -> bool {
        self.matches
            .remove_if(&supervisor.match_id(), |_, current| {
                Arc::ptr_eq(current, supervisor)
            })
            .is_some()
    }

    /// Cancel a match; false if it is unknown
    pub fn stop(&self, id: &Uuid) -> bool {
        match self.get(id) {
            Some(supervisor) => {
                supervisor.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered match; returns how many were signalled
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for entry in self.matches.iter() {
            entry.value().cancel();
            stopped += 1;
        }
        stopped
    }

    pub fn active_matches(&self) -> usize {
        self.matches.iter().filter(|m| m.value().is_started()).count()
    }

    pub fn total_connections(&self) -> usize {
        self.matches.iter().map(|m| m.value().connections()).sum()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_live_timers() {
        let supervisor = MatchSupervisor::new(Uuid::new_v4());
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let fired = fired.clone();
            assert!(supervisor.spawn_timer(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                fired.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(supervisor.active_timers(), 2);

        supervisor.cancel();
        supervisor.join_timers().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(supervisor.active_timers(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!supervisor.spawn_timer(async {}));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent_after_timers_finish() {
        let supervisor = MatchSupervisor::new(Uuid::new_v4());
        supervisor.spawn_timer(async {});
        tokio::time::sleep(Duration::from_millis(10)).await;

        supervisor.cancel();
        supervisor.cancel();
        supervisor.join_timers().await;
        assert!(supervisor.is_cancelled());
        supervisor.cancelled().await;
    }

    #[tokio::test]
    async fn cancelled_wakes_waiters() {
        let supervisor = MatchSupervisor::new(Uuid::new_v4());
        let waiter = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.cancelled().await })
        };
        tokio::task::yield_now().await;
        supervisor.cancel();
        waiter.await.unwrap();
    }

    #[test]
    fn connection_count_never_underflows() {
        let supervisor = MatchSupervisor::new(Uuid::new_v4());
        assert_eq!(supervisor.connect(), 1);
        assert_eq!(supervisor.connect(), 2);
        assert_eq!(supervisor.disconnect(), 1);
        assert_eq!(supervisor.disconnect(), 0);
        assert_eq!(supervisor.disconnect(), 0);
    }

    #[test]
    fn registry_start_claim_and_stale_removal() {
        let registry = MatchRegistry::new();
        let id = Uuid::new_v4();
        let first = registry.get_or_create(id);
        assert!(Arc::ptr_eq(&first, &registry.get_or_create(id)));
        assert!(first.mark_started());
        assert!(!first.mark_started());
        assert_eq!(registry.active_matches(), 1);

        assert!(registry.remove(&first));
        let second = registry.get_or_create(id);
        assert!(!registry.remove(&first));
        assert!(registry.stop(&id));
        assert!(second.is_cancelled());

        let other = registry.get_or_create(Uuid::new_v4());
        assert_eq!(registry.stop_all(), 2);
        assert!(other.is_cancelled());
    }
}

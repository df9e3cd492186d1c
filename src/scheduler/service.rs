//! Start-request scheduler - turns queued match ids into supervised match tasks

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::game::{GameMatch, MatchOutcome, MatchRegistry, MatchSupervisor};
use crate::store::directory::{MatchDirectory, MatchStatus};
use crate::store::StateStore;
use crate::ws::protocol::ServerMsg;

/// Pending start requests before `enqueue` applies backpressure
const START_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Start queue is closed")]
    QueueClosed,
}

/// Match start scheduler
pub struct MatchScheduler {
    start_tx: mpsc::Sender<Uuid>,
    start_rx: Mutex<mpsc::Receiver<Uuid>>,
    registry: Arc<MatchRegistry>,
    store: StateStore,
    directory: Arc<dyn MatchDirectory>,
    config: MatchConfig,
}

impl MatchScheduler {
    pub fn new(
        registry: Arc<MatchRegistry>,
        store: StateStore,
        directory: Arc<dyn MatchDirectory>,
        config: MatchConfig,
    ) -> Self {
        let (start_tx, start_rx) = mpsc::channel(START_QUEUE_CAPACITY);
        Self {
            start_tx,
            start_rx: Mutex::new(start_rx),
            registry,
            store,
            directory,
            config,
        }
    }

    /// Queue a start request
    pub async fn enqueue(&self, match_id: Uuid) -> Result<(), SchedulerError> {
        self.start_tx
            .send(match_id)
            .await
            .map_err(|_| SchedulerError::QueueClosed)?;
        info!(match_id = %match_id, "Match start requested");
        Ok(())
    }

    /// Consume start requests until the queue closes
    pub async fn run(&self) {
        let mut start_rx = self.start_rx.lock().await;
        while let Some(match_id) = start_rx.recv().await {
            self.start_match(match_id);
        }
        warn!("Start queue closed, scheduler stopping");
    }

    /// Spawn the match task unless one is already running.
    /// Returns false for a duplicate request.
    pub fn start_match(&self, match_id: Uuid) -> bool {
        let supervisor = self.registry.get_or_create(match_id);
        if !supervisor.mark_started() {
            warn!(match_id = %match_id, "Match already running, start ignored");
            return false;
        }

        let game = GameMatch::new(
            self.config.clone(),
            self.store.scoped(match_id),
            self.directory.clone(),
            supervisor.clone(),
            rand::random::<u64>(),
        );
        let task = tokio::spawn(game.run());

        let registry = self.registry.clone();
        let store = self.store.clone();
        let directory = self.directory.clone();

        tokio::spawn(async move {
            match task.await {
                Ok(Ok(MatchOutcome::Finished(result))) => {
                    info!(match_id = %match_id, winner = %result.winner, "Match task finished");
                }
                Ok(Ok(MatchOutcome::Cancelled)) => {
                    info!(match_id = %match_id, "Match task cancelled");
                }
                Ok(Err(e)) => {
                    warn!(match_id = %match_id, error = %e, "Match task ended with error");
                }
                Err(e) => {
                    error!(match_id = %match_id, error = %e, "Match task panicked");
                    recover(&supervisor, &store, directory.as_ref()).await;
                }
            }

            registry.remove(&supervisor);
            info!(match_id = %match_id, "Match removed from registry");
        });

        info!(match_id = %match_id, "Match task spawned");
        true
    }
}

/// Best-effort cleanup after the match task died without concluding
async fn recover(
    supervisor: &Arc<MatchSupervisor>,
    store: &StateStore,
    directory: &dyn MatchDirectory,
) {
    let match_id = supervisor.match_id();
    supervisor.cancel();
    supervisor.join_timers().await;

    if let Err(e) = directory
        .set_match_status(match_id, MatchStatus::Cancelled)
        .await
    {
        warn!(match_id = %match_id, error = %e, "Failed to mark crashed match cancelled");
    }
    let _ = supervisor.events().send(ServerMsg::GameAborted);
    store.clear(match_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::directory::{InMemoryDirectory, MatchParameters, MatchSession};
    use std::time::Duration;

    fn scheduler(directory: Arc<InMemoryDirectory>) -> (MatchScheduler, Arc<MatchRegistry>) {
        let registry = Arc::new(MatchRegistry::new());
        let scheduler = MatchScheduler::new(
            registry.clone(),
            StateStore::new(),
            directory,
            MatchConfig::default(),
        );
        (scheduler, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_is_ignored_and_stop_cleans_up() {
        let directory = Arc::new(InMemoryDirectory::new());
        let id = Uuid::new_v4();
        directory.insert_session(
            MatchSession::local(id, "alice", "bob"),
            Some(MatchParameters::default()),
        );
        let (scheduler, registry) = scheduler(directory.clone());

        assert!(scheduler.start_match(id));
        assert!(!scheduler.start_match(id));
        assert_eq!(registry.active_matches(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.stop(&id));

        for _ in 0..10 {
            if registry.get(&id).is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.get(&id).is_none());
        assert_eq!(
            directory.get_match_session(id).await.unwrap().status,
            MatchStatus::Cancelled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn queued_requests_are_started() {
        let directory = Arc::new(InMemoryDirectory::new());
        let id = Uuid::new_v4();
        directory.insert_session(
            MatchSession::local(id, "alice", "bob"),
            Some(MatchParameters::default()),
        );
        let (scheduler, registry) = scheduler(directory);
        let scheduler = Arc::new(scheduler);

        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };
        scheduler.enqueue(id).await.unwrap();
        scheduler.enqueue(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let supervisor = registry.get(&id).unwrap();
        assert!(supervisor.is_started());
        assert_eq!(registry.active_matches(), 1);

        registry.stop(&id);
        runner.abort();
    }

    #[tokio::test]
    async fn recovery_aborts_and_clears() {
        let directory = InMemoryDirectory::new();
        let id = Uuid::new_v4();
        directory.insert_session(MatchSession::local(id, "alice", "bob"), None);
        let store = StateStore::new();
        store.set(id, crate::store::Field::BallX, 400.0);

        let supervisor = MatchSupervisor::new(id);
        let mut rx = supervisor.subscribe();
        recover(&supervisor, &store, &directory).await;

        assert!(supervisor.is_cancelled());
        assert_eq!(store.key_count(id), 0);
        assert_eq!(rx.recv().await.unwrap(), ServerMsg::GameAborted);
        assert_eq!(
            directory.get_match_session(id).await.unwrap().status,
            MatchStatus::Cancelled
        );
    }
}

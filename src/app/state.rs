//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::MatchRegistry;
use crate::scheduler::MatchScheduler;
use crate::store::{
    InMemoryDirectory, MatchDirectory, StateStore, SupabaseClient, SupabaseDirectory,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: StateStore,
    pub directory: Arc<dyn MatchDirectory>,
    pub registry: Arc<MatchRegistry>,
    pub scheduler: Arc<MatchScheduler>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let directory: Arc<dyn MatchDirectory> = match &config.supabase {
            Some(supabase) => {
                info!(url = %supabase.url, "Using Supabase match directory");
                Arc::new(SupabaseDirectory::new(SupabaseClient::new(supabase)))
            }
            None => {
                info!("SUPABASE_URL not set, using in-memory match directory");
                Arc::new(InMemoryDirectory::new())
            }
        };
        Self::with_directory(config, directory)
    }

    pub fn with_directory(config: Config, directory: Arc<dyn MatchDirectory>) -> Self {
        let config = Arc::new(config);
        let store = StateStore::new();
        let registry = Arc::new(MatchRegistry::new());

        let scheduler = Arc::new(MatchScheduler::new(
            registry.clone(),
            store.clone(),
            directory.clone(),
            config.game.clone(),
        ));

        Self {
            config,
            store,
            directory,
            registry,
            scheduler,
        }
    }
}

//! Match state and match directory

pub mod directory;
pub mod keys;
pub mod sessions;
pub mod state;
pub mod supabase;

pub use directory::{InMemoryDirectory, MatchDirectory};
pub use keys::Field;
pub use sessions::SupabaseDirectory;
pub use state::{ScopedStore, StateStore};
pub use supabase::SupabaseClient;

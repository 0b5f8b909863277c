//! Application state management.

use std::path::PathBuf;
use tagscope_core::{Config, QueryEngine, Scope, SqliteTagStore};
use tracing::info;

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// Query engine over the tag database
    pub engine: QueryEngine<SqliteTagStore>,

    /// Where the tag database lives
    pub db_path: PathBuf,
}

impl App {
    /// Create a new application instance.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let db_path = config.db_path()?;
        let store = SqliteTagStore::open_with(&db_path, config.scope.case_insensitive)?;
        let engine = QueryEngine::from_config(store, &config);

        info!(db = %db_path.display(), "Application initialized");

        Ok(App {
            config,
            engine,
            db_path,
        })
    }

    /// The tag database.
    pub fn store(&self) -> &SqliteTagStore {
        self.engine.store()
    }

    /// Scope for the given directories, or the configured default.
    pub fn scope(&self, dirs: &[String]) -> Scope {
        self.config.scope_from(dirs)
    }
}

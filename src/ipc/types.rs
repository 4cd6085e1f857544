use std::path::PathBuf;

use crate::cache::MetricsCache;
use crate::config::Config;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub cache: MetricsCache,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            workspace: None,
            db: None,
            cache: MetricsCache::new(config.cache_ttl, config.cache_max_entries),
            config,
        }
    }

    /// Called after every successful write so no cached aggregate outlives
    /// the rows it was computed from.
    pub fn data_changed(&mut self) {
        let dropped = self.cache.invalidate_all();
        if dropped > 0 {
            tracing::debug!(dropped, "metrics cache invalidated");
        }
    }
}

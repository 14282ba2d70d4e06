use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::models::{Page, PageQuery};
use crate::database::Store;
use crate::storage::FileStorage;

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn FileStorage>,
    pub config: Arc<AppConfig>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn FileStorage>, config: AppConfig) -> Self {
        Self {
            store,
            storage,
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}

impl AppState {
    /// Clamp `?limit=&offset=` into the configured page bounds.
    pub fn page(&self, query: PageQuery) -> Page {
        Page {
            limit: self.config.page_size(query.limit),
            offset: query.offset.unwrap_or(0),
        }
    }
}

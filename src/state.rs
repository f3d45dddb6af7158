use crate::config::DashboardConfig;
use crate::loader::DatasetCache;
use crate::models::FilterSelection;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub cache: Arc<DatasetCache>,
    /// Filter selection per session id.
    pub sessions: Arc<Mutex<HashMap<String, FilterSelection>>>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(DatasetCache::new()),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn selection(&self, session: &str) -> FilterSelection {
        self.sessions.lock().await.get(session).cloned().unwrap_or_default()
    }
}

use std::sync::Arc;

use crate::{
    auth::session::SessionService, builds::BuildService, config::AppConfig, content::ContentStore,
    registry::Registry, storage::ObjectStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub registry: Arc<Registry>,
    pub content: ContentStore,
    pub sessions: SessionService,
    pub builds: Arc<BuildService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        sessions: SessionService,
    ) -> Self {
        let builds = Arc::new(BuildService::new(config.build_workers));
        Self {
            config: Arc::new(config),
            content: ContentStore::new(storage.clone()),
            storage,
            registry: Arc::new(Registry::new()),
            sessions,
            builds,
        }
    }
}

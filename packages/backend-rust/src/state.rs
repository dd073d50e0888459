use std::sync::Arc;
use std::time::Instant;

use noobular_algo::EngineConfig;

use crate::db::Database;
use crate::services::catalog::CourseCatalog;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    db: Database,
    engine: Arc<EngineConfig>,
    catalog: Arc<CourseCatalog>,
}

impl AppState {
    pub fn new(db: Database, engine: EngineConfig) -> Self {
        Self {
            started_at: Instant::now(),
            db,
            engine: Arc::new(engine),
            catalog: Arc::new(CourseCatalog::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn engine(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.engine)
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }
}

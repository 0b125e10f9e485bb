use serde::Serialize;

use crate::config::PublicAppConfig;

#[derive(Debug, Serialize)]
pub struct ResolverHealth {
    pub db_path: String,
    pub persisted_entries: usize,
    pub memory_entries: usize,
    pub queue_depth: usize,
    pub config: PublicAppConfig,
}

impl ResolverHealth {
    pub fn new(
        db_path: String,
        persisted_entries: usize,
        memory_entries: usize,
        queue_depth: usize,
        config: PublicAppConfig,
    ) -> Self {
        Self {
            db_path,
            persisted_entries,
            memory_entries,
            queue_depth,
            config,
        }
    }
}

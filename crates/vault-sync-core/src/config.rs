use std::collections::HashSet;

use crate::enumerate::DEFAULT_LIST_CONCURRENCY;
use crate::errors::{Result, SyncError};
use crate::http::HttpSettings;
use crate::migrate::MigrationOptions;
use crate::types::{Endpoint, Mount};

/// Everything one run needs, built once at startup.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub mounts: Vec<Mount>,
    pub migration: MigrationOptions,
    /// Maximum `LIST` calls in flight while enumerating one mount.
    pub list_concurrency: usize,
    pub http: HttpSettings,
}

impl SyncConfig {
    pub fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            source,
            destination,
            mounts: Mount::defaults(),
            migration: MigrationOptions::default(),
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
            http: HttpSettings::default(),
        }
    }

    pub fn with_mounts(mut self, mounts: Vec<Mount>) -> Self {
        self.mounts = mounts;
        self
    }

    pub fn with_migration(mut self, migration: MigrationOptions) -> Self {
        self.migration = migration;
        self
    }

    pub fn with_list_concurrency(mut self, list_concurrency: usize) -> Self {
        self.list_concurrency = list_concurrency;
        self
    }

    pub fn with_http(mut self, http: HttpSettings) -> Self {
        self.http = http;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.address.is_empty() || self.destination.address.is_empty() {
            return Err(SyncError::Config(
                "source and destination addresses are required".into(),
            ));
        }
        if self.mounts.is_empty() {
            return Err(SyncError::Config("at least one mount is required".into()));
        }
        let mut seen = HashSet::new();
        for mount in &self.mounts {
            if !seen.insert(mount.path()) {
                return Err(SyncError::Config(format!(
                    "mount `{}` listed more than once",
                    mount.path()
                )));
            }
        }
        if self.migration.concurrency == 0 || self.list_concurrency == 0 {
            return Err(SyncError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}

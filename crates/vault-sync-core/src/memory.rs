//! In-memory store that mirrors the subset of Vault KV semantics the sync
//! engine relies on.
//!
//! Flat mounts keep one namespace for list, read and write. Mounts registered
//! with [`MemoryStore::with_versioned_mount`] are listed under `metadata/` and
//! read or written under `data/`, like KV v2. Failures can be injected per
//! path and every read and write is recorded for assertions.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::errors::{Result, StoreError, StoreResult, SyncError};
use crate::session::{Connector, Session};
use crate::store::SecretStore;
use crate::types::{Endpoint, SecretRecord};

#[derive(Default)]
pub struct MemoryStore {
    versioned: Vec<String>,
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    secrets: BTreeMap<String, SecretRecord>,
    fail_list: HashSet<String>,
    fail_read: HashSet<String>,
    fail_write: HashSet<String>,
    reads: Vec<String>,
    writes: Vec<(String, SecretRecord)>,
}

enum Namespace {
    Listing,
    Data,
    Metadata,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versioned_mount(mut self, mount: &str) -> Self {
        self.versioned.push(mount.trim_matches('/').to_string());
        self
    }

    /// Store `record` at a logical read/write path (`secret/a`, `kv-v2/data/x`).
    pub fn insert(&self, path: &str, record: SecretRecord) {
        let key = self.storage_key(path).0;
        self.state().secrets.insert(key, record);
    }

    pub fn get(&self, path: &str) -> Option<SecretRecord> {
        let key = self.storage_key(path).0;
        self.state().secrets.get(&key).cloned()
    }

    /// Logical read/write paths of every stored secret, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state()
            .secrets
            .keys()
            .map(|key| self.logical_path(key))
            .collect()
    }

    pub fn fail_list(&self, path: &str) {
        self.state().fail_list.insert(path.to_string());
    }

    pub fn fail_read(&self, path: &str) {
        self.state().fail_read.insert(path.to_string());
    }

    pub fn fail_write(&self, path: &str) {
        self.state().fail_write.insert(path.to_string());
    }

    pub fn reads(&self) -> Vec<String> {
        self.state().reads.clone()
    }

    pub fn writes(&self) -> Vec<(String, SecretRecord)> {
        self.state().writes.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn versioned_mount<'a>(&'a self, path: &'a str) -> Option<(&'a str, &'a str)> {
        self.versioned.iter().find_map(|mount| {
            path.strip_prefix(mount.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| (mount.as_str(), rest))
        })
    }

    /// Map a request path onto the internal key space.
    fn storage_key(&self, path: &str) -> (String, Namespace) {
        let path = path.trim_start_matches('/');
        let Some((mount, rest)) = self.versioned_mount(path) else {
            return (path.to_string(), Namespace::Listing);
        };
        if let Some(tail) = rest.strip_prefix("data/") {
            (format!("{mount}/{tail}"), Namespace::Data)
        } else if let Some(tail) = rest.strip_prefix("metadata/") {
            (format!("{mount}/{tail}"), Namespace::Metadata)
        } else {
            (path.to_string(), Namespace::Listing)
        }
    }

    fn logical_path(&self, key: &str) -> String {
        match self.versioned_mount(key) {
            Some((mount, rest)) => format!("{mount}/data/{rest}"),
            None => key.to_string(),
        }
    }
}

fn injected(path: &str) -> StoreError {
    StoreError::Status {
        status: 500,
        body: format!("injected failure for {path}"),
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        let state = self.state();
        if state.fail_list.contains(path) {
            return Err(injected(path));
        }
        let (key, namespace) = self.storage_key(path);
        if self.versioned_mount(path).is_some() && !matches!(namespace, Namespace::Metadata) {
            return Ok(None);
        }
        let prefix = if key.ends_with('/') {
            key
        } else {
            format!("{key}/")
        };
        let children: BTreeSet<String> = state
            .secrets
            .range(prefix.clone()..)
            .take_while(|(stored, _)| stored.starts_with(&prefix))
            .filter_map(|(stored, _)| {
                let rest = &stored[prefix.len()..];
                match rest.split_once('/') {
                    Some((dir, _)) => Some(format!("{dir}/")),
                    None if rest.is_empty() => None,
                    None => Some(rest.to_string()),
                }
            })
            .collect();
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(children.into_iter().collect()))
    }

    async fn read(&self, path: &str) -> StoreResult<SecretRecord> {
        let mut state = self.state();
        state.reads.push(path.to_string());
        if state.fail_read.contains(path) {
            return Err(injected(path));
        }
        let (key, namespace) = self.storage_key(path);
        if matches!(namespace, Namespace::Metadata) {
            return Err(StoreError::Status {
                status: 405,
                body: format!("{path} is a metadata path"),
            });
        }
        state
            .secrets
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn write(&self, path: &str, record: &SecretRecord) -> StoreResult<()> {
        let mut state = self.state();
        state.writes.push((path.to_string(), record.clone()));
        if state.fail_write.contains(path) {
            return Err(injected(path));
        }
        let (key, namespace) = self.storage_key(path);
        if matches!(namespace, Namespace::Metadata) || key.ends_with('/') {
            return Err(StoreError::Status {
                status: 405,
                body: format!("cannot write to {path}"),
            });
        }
        state.secrets.insert(key, record.clone());
        Ok(())
    }
}

/// Connector that hands out sessions over registered [`MemoryStore`]s.
#[derive(Default)]
pub struct MemoryConnector {
    stores: HashMap<String, Arc<MemoryStore>>,
    rejected: HashMap<String, String>,
    logins: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, address: &str, store: Arc<MemoryStore>) -> Self {
        self.stores.insert(address.to_string(), store);
        self
    }

    /// Make every login against `address` fail with `message`.
    pub fn reject(mut self, address: &str, message: &str) -> Self {
        self.rejected
            .insert(address.to_string(), message.to_string());
        self
    }

    /// Addresses of successful logins, in order.
    pub fn logins(&self) -> Vec<String> {
        self.logins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn login(&self, endpoint: &Endpoint) -> Result<Session> {
        if let Some(message) = self.rejected.get(&endpoint.address) {
            return Err(SyncError::auth(&endpoint.address, message.clone()));
        }
        if endpoint.credential.expose().is_empty() {
            return Err(SyncError::auth(&endpoint.address, "empty credential"));
        }
        let store = self
            .stores
            .get(&endpoint.address)
            .cloned()
            .ok_or_else(|| SyncError::auth(&endpoint.address, "connection refused"))?;
        self.logins
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(endpoint.address.clone());
        Ok(Session::new(endpoint.address.clone(), store))
    }
}

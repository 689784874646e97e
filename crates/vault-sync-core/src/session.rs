use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::errors::{Result, StoreResult, SyncError};
use crate::http::{HttpSettings, VaultClient};
use crate::store::SecretStore;
use crate::types::{AuthMethod, Endpoint, SecretRecord};

/// Authenticated handle to one store endpoint.
///
/// Cloning is cheap; clones share the underlying store client.
#[derive(Clone)]
pub struct Session {
    address: String,
    store: Arc<dyn SecretStore>,
}

impl Session {
    pub fn new(address: impl Into<String>, store: Arc<dyn SecretStore>) -> Self {
        Self {
            address: address.into(),
            store,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        self.store.list(path).await
    }

    pub async fn read(&self, path: &str) -> StoreResult<SecretRecord> {
        self.store.read(path).await
    }

    pub async fn write(&self, path: &str, record: &SecretRecord) -> StoreResult<()> {
        self.store.write(path, record).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Turns an [`Endpoint`] into a [`Session`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn login(&self, endpoint: &Endpoint) -> Result<Session>;
}

/// Connects to real Vault servers over HTTP.
#[derive(Clone, Debug, Default)]
pub struct VaultConnector {
    settings: HttpSettings,
}

impl VaultConnector {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Connector for VaultConnector {
    async fn login(&self, endpoint: &Endpoint) -> Result<Session> {
        let client = VaultClient::new(&endpoint.address, &self.settings)
            .map_err(|err| SyncError::auth(&endpoint.address, err.to_string()))?;
        let token = match &endpoint.auth {
            AuthMethod::Token => endpoint.credential.expose().to_string(),
            AuthMethod::Github { mount } => client
                .login_github(mount, endpoint.credential.expose())
                .await
                .map_err(|err| SyncError::auth(&endpoint.address, err.to_string()))?,
        };
        info!(
            address = %endpoint.address,
            method = endpoint.auth.name(),
            "authenticated"
        );
        Ok(Session::new(
            endpoint.address.clone(),
            Arc::new(client.with_token(token)),
        ))
    }
}

use async_trait::async_trait;

use crate::errors::StoreResult;
use crate::types::SecretRecord;

/// Logical operations against one Vault server.
///
/// Implementations are shared between copy workers and must tolerate
/// concurrent calls.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Child key names under `path`. `None` means the path has no children;
    /// `Some(vec![])` means the path exists but is currently empty. Keys ending
    /// with `/` are further directories.
    async fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>>;

    /// Field map stored at `path`.
    async fn read(&self, path: &str) -> StoreResult<SecretRecord>;

    async fn write(&self, path: &str, record: &SecretRecord) -> StoreResult<()>;
}

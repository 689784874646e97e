//! Discovery and migration of HashiCorp Vault KV secrets between two servers.
//!
//! A run logs in to a source and a destination server, walks every configured
//! mount on the source, rewrites KV v2 metadata paths into data paths and
//! copies each secret with a bounded pool of workers. Per-secret failures are
//! collected into a [`RunReport`]; login and enumeration failures abort.

pub mod config;
pub mod credentials;
pub mod enumerate;
pub mod errors;
pub mod http;
pub mod memory;
pub mod migrate;
pub mod report;
pub mod run;
pub mod session;
pub mod store;
pub mod translate;
pub mod types;

pub use config::SyncConfig;
pub use credentials::{ResolvedCredentials, default_token_file, resolve_credentials};
pub use enumerate::{PathSet, enumerate};
pub use errors::{Result, StoreError, StoreResult, SyncError};
pub use http::{HttpSettings, VaultClient};
pub use memory::{MemoryConnector, MemoryStore};
pub use migrate::{MigrationOptions, Shutdown, migrate};
pub use report::{CopyFailure, CopyOutcome, FailureKind, MountReport, RunReport};
pub use run::run;
pub use session::{Connector, Session, VaultConnector};
pub use store::SecretStore;
pub use translate::{PathTranslator, translate_versioned};
pub use types::{AuthMethod, Credential, EngineKind, Endpoint, Mount, SecretRecord};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::errors::SyncError;

/// Field map read from one secret path and written verbatim to the destination.
pub type SecretRecord = Map<String, Value>;

pub const DEFAULT_GITHUB_MOUNT: &str = "github";
pub const DEFAULT_FLAT_MOUNT: &str = "secret";
pub const DEFAULT_VERSIONED_MOUNT: &str = "kv-v2";

/// Bearer credential presented to an endpoint. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// How a credential is turned into a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Use the credential as the Vault token.
    Token,
    /// Exchange a GitHub personal token at `auth/{mount}/login`.
    Github { mount: String },
}

impl AuthMethod {
    pub fn github() -> Self {
        AuthMethod::Github {
            mount: DEFAULT_GITHUB_MOUNT.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Token => "token",
            AuthMethod::Github { .. } => "github",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(AuthMethod::Token),
            "github" => Ok(AuthMethod::github()),
            other => Err(SyncError::Config(format!(
                "unsupported auth method `{other}` (expected github or token)"
            ))),
        }
    }
}

/// One Vault server plus the means to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub credential: Credential,
    pub auth: AuthMethod,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, credential: Credential, auth: AuthMethod) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            credential,
            auth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// KV version 1: list, read and write share one namespace.
    Flat,
    /// KV version 2: listed under `metadata/`, read and written under `data/`.
    Versioned,
}

/// A secrets engine mount to migrate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mount {
    path: String,
    engine: EngineKind,
}

impl Mount {
    pub fn new(path: impl AsRef<str>, engine: EngineKind) -> Result<Self, SyncError> {
        let path = path.as_ref().trim_matches('/');
        if path.is_empty() {
            return Err(SyncError::Config("mount path must not be empty".into()));
        }
        Ok(Self {
            path: path.to_string(),
            engine,
        })
    }

    pub fn flat(path: impl AsRef<str>) -> Result<Self, SyncError> {
        Self::new(path, EngineKind::Flat)
    }

    pub fn versioned(path: impl AsRef<str>) -> Result<Self, SyncError> {
        Self::new(path, EngineKind::Versioned)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Path the enumerator starts listing from, always ending with `/`.
    pub fn enumeration_root(&self) -> String {
        match self.engine {
            EngineKind::Flat => format!("{}/", self.path),
            EngineKind::Versioned => format!("{}/metadata/", self.path),
        }
    }

    /// Default mounts: the versioned `kv-v2` engine and the flat `secret` engine.
    pub fn defaults() -> Vec<Mount> {
        vec![
            Mount {
                path: DEFAULT_VERSIONED_MOUNT.into(),
                engine: EngineKind::Versioned,
            },
            Mount {
                path: DEFAULT_FLAT_MOUNT.into(),
                engine: EngineKind::Flat,
            },
        ]
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = match self.engine {
            EngineKind::Flat => "kv",
            EngineKind::Versioned => "kv-v2",
        };
        write!(f, "{}/ ({engine})", self.path)
    }
}

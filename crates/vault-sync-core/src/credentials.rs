//! Resolution of per-endpoint credentials with a shared token file fallback.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{Result, SyncError};
use crate::types::Credential;

/// File under the home directory holding a token shared by both endpoints.
pub const TOKEN_FILE_NAME: &str = ".github-token";

pub fn default_token_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(TOKEN_FILE_NAME))
}

/// Read a token file, trimming surrounding whitespace.
pub fn read_token_file(path: &Path) -> Result<Credential> {
    let raw = fs::read_to_string(path).map_err(|err| {
        SyncError::Credentials(format!("failed to read {}: {err}", path.display()))
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(SyncError::Credentials(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(Credential::new(token))
}

/// Credentials for the source and destination endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub source: Credential,
    pub destination: Credential,
}

/// Fill each missing credential from the token file.
///
/// The file is only read when at least one endpoint lacks an explicit
/// credential. Blank values count as missing.
pub fn resolve_credentials(
    source: Option<String>,
    destination: Option<String>,
    token_file: Option<&Path>,
) -> Result<ResolvedCredentials> {
    let source = source.filter(|value| !value.trim().is_empty());
    let destination = destination.filter(|value| !value.trim().is_empty());

    let fallback = if source.is_none() || destination.is_none() {
        let path = token_file.map(Path::to_path_buf).or_else(default_token_file).ok_or_else(|| {
            SyncError::Credentials("no token given and home directory is unknown".into())
        })?;
        debug!(path = %path.display(), "loading shared token file");
        Some(read_token_file(&path)?)
    } else {
        None
    };

    let pick = |explicit: Option<String>| match explicit {
        Some(value) => Ok(Credential::new(value.trim())),
        None => fallback
            .clone()
            .ok_or_else(|| SyncError::Credentials("token file was not loaded".into())),
    };
    Ok(ResolvedCredentials {
        source: pick(source)?,
        destination: pick(destination)?,
    })
}

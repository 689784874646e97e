//! Vault HTTP API client backing [`SecretStore`].
//!
//! Paths passed to the client are logical Vault paths (`secret/app/db`,
//! `kv-v2/data/app`); the client prefixes them with `/v1/` and attaches the
//! session token and namespace headers.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::errors::{StoreError, StoreResult};
use crate::store::SecretStore;
use crate::types::SecretRecord;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Transport options shared by both endpoints.
#[derive(Clone, Debug)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub ca_bundle: Option<PathBuf>,
    pub insecure_tls: bool,
    pub namespace: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            ca_bundle: None,
            insecure_tls: false,
            namespace: None,
        }
    }
}

impl HttpSettings {
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    pub fn ca_bundle(mut self, path: Option<PathBuf>) -> Self {
        self.ca_bundle = path;
        self
    }

    pub fn insecure_tls(mut self, on: bool) -> Self {
        self.insecure_tls = on;
        self
    }

    pub fn namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|value| !value.is_empty());
        self
    }

    fn build_client(&self) -> StoreResult<Client> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.insecure_tls);
        if let Some(path) = &self.ca_bundle {
            let bytes = std::fs::read(path).map_err(|err| {
                StoreError::Transport(format!(
                    "failed to read CA bundle {}: {err}",
                    path.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes)
                .or_else(|_| reqwest::Certificate::from_der(&bytes))
                .map_err(|err| StoreError::Transport(format!("failed to parse CA bundle: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }
        builder
            .build()
            .map_err(|err| StoreError::Transport(format!("failed to build HTTP client: {err}")))
    }
}

/// Client for one Vault server.
#[derive(Clone)]
pub struct VaultClient {
    client: Client,
    address: String,
    token: Option<String>,
    namespace: Option<String>,
}

impl VaultClient {
    pub fn new(address: impl Into<String>, settings: &HttpSettings) -> StoreResult<Self> {
        Ok(Self {
            client: settings.build_client()?,
            address: address.into().trim_end_matches('/').to_string(),
            token: None,
            namespace: settings.namespace.clone(),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Exchange a GitHub personal token for a Vault client token.
    pub async fn login_github(&self, mount: &str, github_token: &str) -> StoreResult<String> {
        let path = format!("auth/{}/login", mount.trim_matches('/'));
        let response = self
            .request(Method::POST, &path, Some(json!({ "token": github_token })))
            .await?;
        let body = success_body(response).await?;
        let parsed: LoginResponse = serde_json::from_str(&body)
            .map_err(|err| StoreError::Decode(format!("{err}; body={body}")))?;
        parsed
            .auth
            .and_then(|auth| auth.client_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| StoreError::Decode("login response missing auth.client_token".into()))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> StoreResult<Response> {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        if let Some(payload) = body {
            builder = builder.json(&payload);
        }
        builder
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    async fn list(&self, path: &str) -> StoreResult<Option<Vec<String>>> {
        let method = Method::from_bytes(b"LIST")
            .map_err(|err| StoreError::Transport(format!("LIST method unsupported: {err}")))?;
        let response = self.request(method, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(address = %self.address, %path, "no children");
            return Ok(None);
        }
        let body = success_body(response).await?;
        let parsed: ListResponse = serde_json::from_str(&body)
            .map_err(|err| StoreError::Decode(format!("{err}; body={body}")))?;
        let keys = parsed.data.and_then(|data| data.keys).unwrap_or_default();
        debug!(address = %self.address, %path, children = keys.len(), "listed");
        Ok(Some(keys))
    }

    async fn read(&self, path: &str) -> StoreResult<SecretRecord> {
        let response = self.request(Method::GET, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        let body = success_body(response).await?;
        let parsed: ReadResponse = serde_json::from_str(&body)
            .map_err(|err| StoreError::Decode(format!("{err}; body={body}")))?;
        parsed
            .data
            .ok_or_else(|| StoreError::Decode(format!("read of {path} returned no data")))
    }

    async fn write(&self, path: &str, record: &SecretRecord) -> StoreResult<()> {
        let response = self
            .request(Method::POST, path, Some(Value::Object(record.clone())))
            .await?;
        success_body(response).await.map(|_| ())
    }
}

async fn success_body(response: Response) -> StoreResult<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        return Ok(body);
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        body: error_message(&body),
    })
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join("; "),
        _ => body.trim().to_string(),
    }
}

#[derive(Deserialize)]
struct ListResponse {
    data: Option<ListData>,
}

#[derive(Deserialize)]
struct ListData {
    keys: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ReadResponse {
    data: Option<SecretRecord>,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

//! Minimal Vault HTTP server for tests.
//!
//! Supports token and GitHub login, `LIST`, `GET` and `POST` on flat and KV v2
//! mounts. KV v2 reads are wrapped in `{"data": {...}, "metadata": {...}}` and
//! writes unwrap the `data` field, like a real server.

#![allow(dead_code)]

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const ROOT_TOKEN: &str = "s.root";
pub const GITHUB_TOKEN: &str = "ghp_valid";

#[derive(Clone)]
pub struct FakeVault {
    state: Arc<Mutex<FakeState>>,
    versioned: Arc<Vec<String>>,
}

struct FakeState {
    secrets: BTreeMap<String, Value>,
    requests: Vec<(String, String)>,
    versions: BTreeMap<String, u64>,
}

impl FakeVault {
    pub fn new(versioned: &[&str]) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                secrets: BTreeMap::new(),
                requests: Vec::new(),
                versions: BTreeMap::new(),
            })),
            versioned: Arc::new(versioned.iter().map(|m| m.to_string()).collect()),
        }
    }

    /// Seed fields at a read path (`secret/a`, `kv-v2/data/x`).
    pub fn seed(&self, path: &str, fields: Value) {
        let key = self.key(path).0;
        self.state.lock().unwrap().secrets.insert(key, fields);
    }

    /// Fields stored at a read path.
    pub fn fields(&self, path: &str) -> Option<Value> {
        let key = self.key(path).0;
        self.state.lock().unwrap().secrets.get(&key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().secrets.keys().cloned().collect()
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub async fn serve(self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake vault");
        let addr = listener.local_addr().expect("local addr");
        let app = Router::new().fallback(handle).with_state(self);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake vault server");
        });
        addr
    }

    /// (storage key, versioned namespace) for a request path.
    fn key(&self, path: &str) -> (String, Option<&'static str>) {
        let path = path.trim_start_matches('/');
        for mount in self.versioned.iter() {
            if let Some(rest) = path
                .strip_prefix(mount.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            {
                if let Some(tail) = rest.strip_prefix("data/") {
                    return (format!("{mount}/{tail}"), Some("data"));
                }
                if let Some(tail) = rest.strip_prefix("metadata/") {
                    return (format!("{mount}/{tail}"), Some("metadata"));
                }
                return (path.to_string(), Some("other"));
            }
        }
        (path.to_string(), None)
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(json!({ "errors": [message] }))).into_response()
}

async fn handle(
    State(vault): State<FakeVault>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(path) = uri.path().strip_prefix("/v1/") else {
        return error(StatusCode::NOT_FOUND, "unsupported path");
    };
    let path = path.to_string();
    vault
        .state
        .lock()
        .unwrap()
        .requests
        .push((method.as_str().to_string(), path.clone()));

    if path == "auth/github/login" && method == Method::POST {
        let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        if payload["token"] == GITHUB_TOKEN {
            return axum::Json(json!({ "auth": { "client_token": ROOT_TOKEN } })).into_response();
        }
        return error(StatusCode::BAD_REQUEST, "invalid github token");
    }

    let authorized = headers
        .get("X-Vault-Token")
        .and_then(|value| value.to_str().ok())
        == Some(ROOT_TOKEN);
    if !authorized {
        return error(StatusCode::FORBIDDEN, "permission denied");
    }

    let (key, namespace) = vault.key(&path);
    match method.as_str() {
        "LIST" => {
            if matches!(namespace, Some("data") | Some("other")) {
                return error(StatusCode::NOT_FOUND, "");
            }
            let prefix = if key.ends_with('/') {
                key.clone()
            } else {
                format!("{key}/")
            };
            let state = vault.state.lock().unwrap();
            let children: BTreeSet<String> = state
                .secrets
                .keys()
                .filter_map(|stored| stored.strip_prefix(prefix.as_str()))
                .filter(|rest| !rest.is_empty())
                .map(|rest| match rest.split_once('/') {
                    Some((dir, _)) => format!("{dir}/"),
                    None => rest.to_string(),
                })
                .collect();
            if children.is_empty() {
                return (StatusCode::NOT_FOUND, axum::Json(json!({ "errors": [] })))
                    .into_response();
            }
            axum::Json(json!({ "data": { "keys": children } })).into_response()
        }
        "GET" => {
            let state = vault.state.lock().unwrap();
            let Some(fields) = state.secrets.get(&key).cloned() else {
                return (StatusCode::NOT_FOUND, axum::Json(json!({ "errors": [] })))
                    .into_response();
            };
            match namespace {
                Some("data") => {
                    let version = state.versions.get(&key).copied().unwrap_or(1);
                    axum::Json(json!({
                        "data": {
                            "data": fields,
                            "metadata": { "version": version, "destroyed": false }
                        }
                    }))
                    .into_response()
                }
                Some(_) => error(StatusCode::METHOD_NOT_ALLOWED, "unsupported namespace"),
                None => axum::Json(json!({ "data": fields })).into_response(),
            }
        }
        "POST" => {
            let payload: Value = match serde_json::from_slice(&body) {
                Ok(value) => value,
                Err(_) => return error(StatusCode::BAD_REQUEST, "invalid json"),
            };
            let mut state = vault.state.lock().unwrap();
            match namespace {
                Some("data") => {
                    let Some(fields) = payload.get("data").cloned() else {
                        return error(StatusCode::BAD_REQUEST, "no data provided");
                    };
                    state.secrets.insert(key.clone(), fields);
                    let version = state.versions.entry(key).or_insert(0);
                    *version += 1;
                    axum::Json(json!({ "data": { "version": *version } })).into_response()
                }
                Some(_) => error(StatusCode::METHOD_NOT_ALLOWED, "unsupported namespace"),
                None => {
                    state.secrets.insert(key, payload);
                    StatusCode::NO_CONTENT.into_response()
                }
            }
        }
        _ => error(StatusCode::METHOD_NOT_ALLOWED, "unsupported method"),
    }
}

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use td_api_types::{ContractArtifact, RpcRequest, RpcResponse};
use td_contract_client::{ArtifactSource, ContractError};
use td_provider::{Eip1193, ProviderError};
use tracing::{debug, warn};

pub const DEFAULT_RPC_URL: &str = "http://localhost:7545";

/// JSON-RPC over HTTP to a node (devnode, Ganache, ...).
///
/// Reads `TODO_RPC_URL` from environment at construction time
/// (default: `http://localhost:7545`).
pub struct HttpProvider {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        Self::from_lookup(endpoint, |key| std::env::var(key).ok())
    }

    /// Explicit endpoint, then `TODO_RPC_URL` from `lookup`, then the default.
    pub fn from_lookup(endpoint: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| lookup("TODO_RPC_URL").filter(|url| !url.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait(?Send)]
impl Eip1193 for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = RpcRequest::new(id, method, params);
        debug!(id, method, "rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(format!("{method}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("{method}: HTTP {status}: {text}")));
        }

        let reply: RpcResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(format!("{method}: {err}")))?;

        if reply.id.as_u64() != Some(id) {
            warn!(expected = id, got = %reply.id, "rpc response id mismatch");
        }

        match (reply.result, reply.error) {
            (_, Some(err)) => Err(err.into()),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Fetches build artifacts relative to a base URL.
pub struct HttpArtifactSource {
    base_url: String,
    http: reqwest::Client,
}

impl HttpArtifactSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait(?Send)]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch_artifact(&self, path: &str) -> Result<ContractArtifact, ContractError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| ContractError::Artifact(format!("GET {url}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContractError::Artifact(format!("GET {url}: HTTP {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|err| ContractError::Artifact(format!("GET {url}: {err}")))?;
        td_contract_client::parse_artifact(&text)
    }
}

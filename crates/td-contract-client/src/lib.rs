use async_trait::async_trait;
use serde_json::{Value, json};
use td_abi::{AbiError, Call};
use td_api_types::{CallRequest, ContractArtifact, NetworkId, Task, WalletAddress, ZERO_ADDRESS};
use td_provider::{Eip1193, ProviderError};
use thiserror::Error;
use tracing::{debug, info};

/// Path of the build artifact, relative to the page that loads it.
pub const TODO_LIST_ARTIFACT: &str = "TodoList.json";

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("{contract} is not deployed on network {network}")]
    NotDeployed { contract: String, network: NetworkId },
    #[error("failed to load contract artifact: {0}")]
    Artifact(String),
    #[error("a sender account is required to send transactions")]
    MissingSender,
    #[error(transparent)]
    Abi(#[from] AbiError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The TodoList contract surface.
#[async_trait(?Send)]
pub trait TodoList {
    fn address(&self) -> &str;
    async fn task_count(&self) -> Result<u64, ContractError>;
    async fn task(&self, index: u64) -> Result<Task, ContractError>;
    /// Returns the transaction hash.
    async fn create_task(&self, content: &str) -> Result<String, ContractError>;
    /// Returns the transaction hash.
    async fn toggle_completed(&self, index: u64) -> Result<String, ContractError>;
}

/// Where the interface descriptor comes from (an HTTP GET in practice).
#[async_trait(?Send)]
pub trait ArtifactSource {
    async fn fetch_artifact(&self, path: &str) -> Result<ContractArtifact, ContractError>;
}

pub fn parse_artifact(raw: &str) -> Result<ContractArtifact, ContractError> {
    serde_json::from_str(raw).map_err(|err| ContractError::Artifact(err.to_string()))
}

/// Resolve the address the artifact records for `network`.
pub fn deployed_address(artifact: &ContractArtifact, network: &NetworkId) -> Result<String, ContractError> {
    let not_deployed = || ContractError::NotDeployed {
        contract: artifact.contract_name.clone(),
        network: network.clone(),
    };

    let address = artifact
        .networks
        .get(&network.0)
        .map(|deployment| deployment.address.trim())
        .ok_or_else(not_deployed)?;

    if address.is_empty() || address.eq_ignore_ascii_case(ZERO_ADDRESS) {
        return Err(not_deployed());
    }
    Ok(address.to_owned())
}

/// Attach `provider` to the instance of `artifact` deployed on the provider's network.
pub async fn bind<P: Eip1193>(artifact: &ContractArtifact, provider: P) -> Result<RpcTodoList<P>, ContractError> {
    let network = td_provider::network_id(&provider).await?;
    let address = deployed_address(artifact, &network)?;
    info!(contract = %artifact.contract_name, %network, %address, "contract bound");
    Ok(RpcTodoList::new(provider, address))
}

/// Fetch the descriptor at `path` and bind it.
pub async fn load_contract<S, P>(source: &S, path: &str, provider: P) -> Result<RpcTodoList<P>, ContractError>
where
    S: ArtifactSource + ?Sized,
    P: Eip1193,
{
    let artifact = source.fetch_artifact(path).await?;
    bind(&artifact, provider).await
}

/// Contract binding that talks ABI over an EIP-1193 provider.
pub struct RpcTodoList<P> {
    provider: P,
    address: String,
    from: Option<String>,
}

impl<P: Eip1193> RpcTodoList<P> {
    pub fn new(provider: P, address: impl Into<String>) -> Self {
        Self {
            provider,
            address: address.into(),
            from: None,
        }
    }

    /// Account used as `from` for state-changing calls.
    pub fn with_sender(mut self, account: &WalletAddress) -> Self {
        self.from = Some(account.0.clone());
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    async fn call(&self, call: Call) -> Result<Vec<u8>, ContractError> {
        let tx = CallRequest {
            from: self.from.clone(),
            to: self.address.clone(),
            data: td_abi::to_hex(&td_abi::encode_call(&call)),
        };
        debug!(?call, to = %self.address, "eth_call");
        let value = self.provider.request("eth_call", json!([tx, "latest"])).await?;
        let hex = value
            .as_str()
            .ok_or_else(|| ProviderError::Decode(format!("eth_call: expected hex string, got {value}")))?;
        Ok(td_abi::from_hex(hex)?)
    }

    async fn send(&self, call: Call) -> Result<String, ContractError> {
        let from = self.from.clone().ok_or(ContractError::MissingSender)?;
        let tx = CallRequest {
            from: Some(from),
            to: self.address.clone(),
            data: td_abi::to_hex(&td_abi::encode_call(&call)),
        };
        debug!(?call, to = %self.address, "eth_sendTransaction");
        let value = self.provider.request("eth_sendTransaction", json!([tx])).await?;
        match value {
            Value::String(hash) => Ok(hash),
            other => Err(ProviderError::Decode(format!("eth_sendTransaction: {other}")).into()),
        }
    }
}

#[async_trait(?Send)]
impl<P: Eip1193> TodoList for RpcTodoList<P> {
    fn address(&self) -> &str {
        &self.address
    }

    async fn task_count(&self) -> Result<u64, ContractError> {
        let data = self.call(Call::TaskCount).await?;
        Ok(td_abi::decode_uint(&data)?)
    }

    async fn task(&self, index: u64) -> Result<Task, ContractError> {
        let data = self.call(Call::Tasks(index)).await?;
        Ok(td_abi::decode_task(&data)?)
    }

    async fn create_task(&self, content: &str) -> Result<String, ContractError> {
        self.send(Call::CreateTask(content.to_owned())).await
    }

    async fn toggle_completed(&self, index: u64) -> Result<String, ContractError> {
        self.send(Call::ToggleCompleted(index)).await
    }
}

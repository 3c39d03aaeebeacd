//! In-memory TodoList contract and a tiny dev chain hosting it.
//!
//! `DevChain` answers the JSON-RPC subset the dApp needs. It backs both the
//! `devnode` service and [`MemoryProvider`], the in-process provider used by
//! tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use td_abi::Call;
use td_api_types::{
    CallRequest, ContractArtifact, NetworkDeployment, RpcErrorObject, Task, TaskEvent,
    USER_REJECTED_REQUEST,
};
use td_provider::{Eip1193, ProviderError};
use thiserror::Error;
use tracing::{debug, info};

pub const SEED_TASK: &str = "Check out dappuniversity.com";
pub const DEFAULT_NETWORK_ID: &str = "5777";
pub const DEFAULT_ACCOUNT: &str = "0x627306090abab3a6e1400e9345bc60c78a8bef57";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x345ca3e014aaf5dca488057592ee47305d9b3e10";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const EXECUTION_REVERTED: i64 = -32000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractStateError {
    #[error("task {0} does not exist")]
    UnknownTask(u64),
}

/// Contract storage: tasks with dense ids `0..count` and the emitted event log.
#[derive(Debug, Clone)]
pub struct TodoListState {
    tasks: Vec<Task>,
    events: Vec<TaskEvent>,
}

impl Default for TodoListState {
    fn default() -> Self {
        Self::deploy()
    }
}

impl TodoListState {
    /// Constructor: deploys with a single seed task.
    pub fn deploy() -> Self {
        let mut state = Self {
            tasks: Vec::new(),
            events: Vec::new(),
        };
        state.create_task(SEED_TASK);
        state
    }

    pub fn task_count(&self) -> u64 {
        self.tasks.len() as u64
    }

    /// Public-mapping read: an id never written reads as the zero record.
    pub fn task(&self, index: u64) -> Task {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.tasks.get(i))
            .cloned()
            .unwrap_or(Task {
                id: 0,
                content: String::new(),
                done: false,
            })
    }

    pub fn create_task(&mut self, content: &str) -> TaskEvent {
        let task = Task {
            id: self.task_count(),
            content: content.to_owned(),
            done: false,
        };
        let event = TaskEvent::TaskCreated {
            id: task.id,
            content: task.content.clone(),
            done: task.done,
        };
        self.tasks.push(task);
        self.events.push(event.clone());
        event
    }

    pub fn toggle_completed(&mut self, index: u64) -> Result<TaskEvent, ContractStateError> {
        let task = usize::try_from(index)
            .ok()
            .and_then(|i| self.tasks.get_mut(i))
            .ok_or(ContractStateError::UnknownTask(index))?;
        task.done = !task.done;
        let event = TaskEvent::TaskCompleted {
            id: task.id,
            done: task.done,
        };
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn events(&self) -> &[TaskEvent] {
        &self.events
    }
}

#[derive(Debug, Clone)]
pub struct DevChainConfig {
    pub network_id: String,
    pub accounts: Vec<String>,
    pub contract_address: String,
    /// Answer `eth_requestAccounts` with a user rejection.
    pub deny_authorization: bool,
}

impl Default for DevChainConfig {
    fn default() -> Self {
        Self {
            network_id: DEFAULT_NETWORK_ID.to_owned(),
            accounts: vec![DEFAULT_ACCOUNT.to_owned()],
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_owned(),
            deny_authorization: false,
        }
    }
}

/// Receipt of a mined transaction, kept so `eth_getTransactionReceipt` can answer.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: String,
    pub from: String,
    pub block_number: u64,
    pub logs: Vec<TaskEvent>,
}

#[derive(Debug, Clone, Default)]
pub struct DevChain {
    config: DevChainConfig,
    contract: TodoListState,
    receipts: HashMap<String, Receipt>,
    block_number: u64,
}

impl DevChain {
    pub fn new(config: DevChainConfig) -> Self {
        info!(network_id = %config.network_id, address = %config.contract_address, "TodoList deployed");
        Self {
            config,
            contract: TodoListState::deploy(),
            receipts: HashMap::new(),
            block_number: 0,
        }
    }

    pub fn config(&self) -> &DevChainConfig {
        &self.config
    }

    pub fn contract(&self) -> &TodoListState {
        &self.contract
    }

    /// Build artifact describing the deployment on this chain.
    pub fn artifact(&self) -> ContractArtifact {
        let mut networks = HashMap::new();
        networks.insert(
            self.config.network_id.clone(),
            NetworkDeployment {
                address: self.config.contract_address.clone(),
                transaction_hash: None,
            },
        );
        ContractArtifact {
            contract_name: "TodoList".to_owned(),
            abi: abi_description(),
            networks,
        }
    }

    /// Whether `method` only reads chain state.
    pub fn is_read_only(method: &str) -> bool {
        method != "eth_sendTransaction"
    }

    /// Read-only JSON-RPC methods.
    pub fn query(&self, method: &str, params: &Value) -> Result<Value, RpcErrorObject> {
        match method {
            "eth_requestAccounts" if self.config.deny_authorization => Err(RpcErrorObject {
                code: USER_REJECTED_REQUEST,
                message: "User rejected the request.".to_owned(),
            }),
            "eth_requestAccounts" | "eth_accounts" => Ok(json!(self.config.accounts)),
            "net_version" => Ok(json!(self.config.network_id)),
            "eth_chainId" => {
                let id: u64 = self.config.network_id.parse().unwrap_or_default();
                Ok(json!(format!("0x{id:x}")))
            }
            "eth_blockNumber" => Ok(json!(format!("0x{:x}", self.block_number))),
            "eth_call" => {
                let tx = first_tx(params)?;
                self.check_target(&tx)?;
                let call = decode(&tx.data)?;
                let out = match call {
                    Call::TaskCount => td_abi::encode_uint(self.contract.task_count()),
                    Call::Tasks(index) => td_abi::encode_task(&self.contract.task(index)),
                    Call::CreateTask(_) | Call::ToggleCompleted(_) => Vec::new(),
                };
                Ok(json!(td_abi::to_hex(&out)))
            }
            "eth_getTransactionReceipt" => {
                let hash = params
                    .get(0)
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid_params("expected transaction hash"))?;
                Ok(self.receipts.get(hash).map_or(Value::Null, receipt_json))
            }
            other => Err(RpcErrorObject {
                code: METHOD_NOT_FOUND,
                message: format!("the method {other} does not exist/is not available"),
            }),
        }
    }

    /// Any JSON-RPC method, including state-changing ones.
    pub fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, RpcErrorObject> {
        if Self::is_read_only(method) {
            return self.query(method, params);
        }

        let tx = first_tx(params)?;
        self.check_target(&tx)?;
        let from = tx
            .from
            .clone()
            .filter(|from| self.config.accounts.iter().any(|a| a.eq_ignore_ascii_case(from)))
            .ok_or_else(|| invalid_params("sender is not an unlocked account"))?;

        let logs = match decode(&tx.data)? {
            Call::CreateTask(content) => vec![self.contract.create_task(&content)],
            Call::ToggleCompleted(index) => {
                let event = self.contract.toggle_completed(index).map_err(|err| RpcErrorObject {
                    code: EXECUTION_REVERTED,
                    message: format!("execution reverted: {err}"),
                })?;
                vec![event]
            }
            Call::TaskCount | Call::Tasks(_) => Vec::new(),
        };

        self.block_number += 1;
        let tx_hash = tx_hash(&from, &tx.data, self.block_number);
        debug!(%tx_hash, block = self.block_number, "transaction mined");
        self.receipts.insert(
            tx_hash.clone(),
            Receipt {
                tx_hash: tx_hash.clone(),
                from,
                block_number: self.block_number,
                logs,
            },
        );
        Ok(json!(tx_hash))
    }

    fn check_target(&self, tx: &CallRequest) -> Result<(), RpcErrorObject> {
        if tx.to.eq_ignore_ascii_case(&self.config.contract_address) {
            Ok(())
        } else {
            Err(invalid_params(&format!("no contract at {}", tx.to)))
        }
    }
}

/// In-process provider over a [`DevChain`]. Records every method it serves.
pub struct MemoryProvider {
    chain: RefCell<DevChain>,
    calls: RefCell<Vec<String>>,
}

impl MemoryProvider {
    pub fn new(chain: DevChain) -> Self {
        Self {
            chain: RefCell::new(chain),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn chain(&self) -> Ref<'_, DevChain> {
        self.chain.borrow()
    }

    /// Methods served so far; `eth_call`s are expanded to the contract call.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }
}

#[async_trait(?Send)]
impl Eip1193 for MemoryProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let label = match (method, first_tx(&params)) {
            ("eth_call", Ok(tx)) => match decode(&tx.data) {
                Ok(call) => format!("eth_call:{}", call_label(&call)),
                Err(_) => method.to_owned(),
            },
            _ => method.to_owned(),
        };
        self.calls.borrow_mut().push(label);
        Ok(self.chain.borrow_mut().dispatch(method, &params)?)
    }
}

fn call_label(call: &Call) -> String {
    match call {
        Call::TaskCount => "taskCount".to_owned(),
        Call::Tasks(index) => format!("tasks({index})"),
        Call::CreateTask(_) => "createTask".to_owned(),
        Call::ToggleCompleted(index) => format!("toggleCompleted({index})"),
    }
}

fn first_tx(params: &Value) -> Result<CallRequest, RpcErrorObject> {
    let raw = params
        .get(0)
        .cloned()
        .ok_or_else(|| invalid_params("expected transaction object"))?;
    serde_json::from_value::<CallRequest>(raw).map_err(|err| invalid_params(&err.to_string()))
}

fn decode(data: &str) -> Result<Call, RpcErrorObject> {
    let bytes = td_abi::from_hex(data).map_err(|err| invalid_params(&err.to_string()))?;
    td_abi::decode_call(&bytes).map_err(|err| RpcErrorObject {
        code: EXECUTION_REVERTED,
        message: format!("execution reverted: {err}"),
    })
}

fn invalid_params(message: &str) -> RpcErrorObject {
    RpcErrorObject {
        code: INVALID_PARAMS,
        message: message.to_owned(),
    }
}

fn tx_hash(from: &str, data: &str, block_number: u64) -> String {
    let digest = Sha256::digest(format!("{from}:{data}:{block_number}").as_bytes());
    td_abi::to_hex(&digest)
}

fn receipt_json(receipt: &Receipt) -> Value {
    json!({
        "transactionHash": receipt.tx_hash,
        "from": receipt.from,
        "blockNumber": format!("0x{:x}", receipt.block_number),
        "status": "0x1",
        "logs": receipt.logs,
    })
}

fn abi_description() -> Vec<Value> {
    vec![
        json!({"type": "function", "name": "taskCount", "inputs": [],
               "outputs": [{"name": "", "type": "uint256"}], "stateMutability": "view"}),
        json!({"type": "function", "name": "tasks", "inputs": [{"name": "", "type": "uint256"}],
               "outputs": [{"name": "id", "type": "uint256"}, {"name": "content", "type": "string"},
                           {"name": "done", "type": "bool"}], "stateMutability": "view"}),
        json!({"type": "function", "name": "createTask", "inputs": [{"name": "_content", "type": "string"}],
               "outputs": [], "stateMutability": "nonpayable"}),
        json!({"type": "function", "name": "toggleCompleted", "inputs": [{"name": "_id", "type": "uint256"}],
               "outputs": [], "stateMutability": "nonpayable"}),
        json!({"type": "event", "name": "TaskCreated", "inputs": [
               {"name": "id", "type": "uint256"}, {"name": "content", "type": "string"},
               {"name": "done", "type": "bool"}]}),
        json!({"type": "event", "name": "TaskCompleted", "inputs": [
               {"name": "id", "type": "uint256"}, {"name": "done", "type": "bool"}]}),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_data(call: Call) -> String {
        td_abi::to_hex(&td_abi::encode_call(&call))
    }

    #[test]
    fn deploys_with_one_seed_task() {
        let state = TodoListState::deploy();
        assert_eq!(state.task_count(), 1);
        assert_eq!(state.task(0).content, SEED_TASK);
        assert!(!state.task(0).done);
    }

    #[test]
    fn create_task_appends_dense_id_and_emits_event() {
        let mut state = TodoListState::deploy();
        let event = state.create_task("hello world");
        assert_eq!(state.task_count(), 2);
        assert_eq!(
            event,
            TaskEvent::TaskCreated {
                id: 1,
                content: "hello world".to_owned(),
                done: false,
            }
        );
        assert_eq!(state.task(1).id, 1);
    }

    #[test]
    fn toggle_flips_done_and_keeps_id() {
        let mut state = TodoListState::deploy();
        let event = state.toggle_completed(0).unwrap();
        assert_eq!(event, TaskEvent::TaskCompleted { id: 0, done: true });
        assert_eq!(state.task(0).id, 0);
        assert!(state.task(0).done);

        assert_eq!(
            state.toggle_completed(5),
            Err(ContractStateError::UnknownTask(5))
        );
        assert_eq!(state.events().len(), 2);
    }

    #[test]
    fn unwritten_index_reads_as_zero_record() {
        let state = TodoListState::deploy();
        assert_eq!(state.task(42), Task { id: 0, content: String::new(), done: false });
    }

    #[test]
    fn denied_authorization_uses_user_rejected_code() {
        let chain = DevChain::new(DevChainConfig {
            deny_authorization: true,
            ..DevChainConfig::default()
        });
        let err = chain.query("eth_requestAccounts", &json!([])).unwrap_err();
        assert_eq!(err.code, USER_REJECTED_REQUEST);
        assert_eq!(chain.query("eth_accounts", &json!([])).unwrap(), json!([DEFAULT_ACCOUNT]));
    }

    #[test]
    fn send_transaction_records_receipt_with_logs() {
        let mut chain = DevChain::default();
        let tx = json!([{
            "from": DEFAULT_ACCOUNT,
            "to": DEFAULT_CONTRACT_ADDRESS,
            "data": call_data(Call::CreateTask("hello world".to_owned())),
        }]);
        let hash = chain.dispatch("eth_sendTransaction", &tx).unwrap();
        let receipt = chain.query("eth_getTransactionReceipt", &json!([hash])).unwrap();
        assert_eq!(receipt["blockNumber"], "0x1");
        assert_eq!(receipt["logs"][0]["event"], "TaskCreated");
        assert_eq!(receipt["logs"][0]["content"], "hello world");
    }

    #[test]
    fn send_from_unknown_account_is_rejected() {
        let mut chain = DevChain::default();
        let tx = json!([{
            "from": "0xdead",
            "to": DEFAULT_CONTRACT_ADDRESS,
            "data": call_data(Call::ToggleCompleted(0)),
        }]);
        let err = chain.dispatch("eth_sendTransaction", &tx).unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(!chain.contract().task(0).done);
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let chain = DevChain::default();
        let err = chain.query("eth_getBalance", &json!([])).unwrap_err();
        assert_eq!(err.code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn provider_records_contract_calls() -> Result<(), ProviderError> {
        let provider = MemoryProvider::new(DevChain::default());
        let tx = json!([{"to": DEFAULT_CONTRACT_ADDRESS, "data": call_data(Call::Tasks(0))}, "latest"]);
        provider.request("eth_call", tx).await?;
        provider.request("net_version", json!([])).await?;
        assert_eq!(provider.calls(), vec!["eth_call:tasks(0)", "net_version"]);
        Ok(())
    }
}

//! Session state and the dApp load pipeline.
//!
//! `Unloaded → WalletConnecting → Bound → Rendering → Ready`; any failure
//! parks the session in `Failed`. There is no way back and no cancellation.

pub mod render;

pub use render::{TaskView, render_tasks, toggle_loading};

use td_api_types::WalletAddress;
use td_contract_client::{ArtifactSource, ContractError, RpcTodoList, TodoList};
use td_provider::{Detected, Eip1193, ProviderError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unloaded,
    /// Everything before a bound contract: authorization, then account
    /// resolution joined with contract binding.
    WalletConnecting,
    Bound,
    Rendering,
    Ready,
    Failed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{source} (while {phase:?})")]
    Provider {
        phase: Phase,
        #[source]
        source: ProviderError,
    },
    #[error("{source} (while {phase:?})")]
    Contract {
        phase: Phase,
        #[source]
        source: ContractError,
    },
    #[error("session has no bound contract")]
    NotBound,
}

impl SessionError {
    /// Phase the pipeline was in when it stopped.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SessionError::Provider { phase, .. } | SessionError::Contract { phase, .. } => Some(*phase),
            SessionError::NotBound => None,
        }
    }

    pub fn is_authorization_denied(&self) -> bool {
        matches!(
            self,
            SessionError::Provider {
                source: ProviderError::AuthorizationDenied,
                ..
            }
        )
    }
}

/// Per-page state, passed by reference into each phase.
pub struct Session<C> {
    account: Option<WalletAddress>,
    loading: bool,
    phase: Phase,
    contract: Option<C>,
}

impl<C> Default for Session<C> {
    fn default() -> Self {
        Self {
            account: None,
            loading: false,
            phase: Phase::Unloaded,
            contract: None,
        }
    }
}

impl<C> Session<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self) -> Option<&WalletAddress> {
        self.account.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn contract(&self) -> Option<&C> {
        self.contract.as_ref()
    }

    pub fn set_loading<V: TaskView + ?Sized>(&mut self, view: &mut V, loading: bool) {
        self.loading = loading;
        toggle_loading(view, loading);
    }

    fn fail_provider(&mut self, source: ProviderError) -> SessionError {
        let phase = self.phase;
        self.phase = Phase::Failed;
        SessionError::Provider { phase, source }
    }

    fn fail_contract(&mut self, source: ContractError) -> SessionError {
        let phase = self.phase;
        self.phase = Phase::Failed;
        SessionError::Contract { phase, source }
    }
}

impl<C: TodoList> Session<C> {
    /// Session over an already bound contract.
    pub fn bound(account: WalletAddress, contract: C) -> Self {
        Self {
            account: Some(account),
            loading: false,
            phase: Phase::Bound,
            contract: Some(contract),
        }
    }

    /// Render pass bracketed by the loading toggle.
    ///
    /// The loader is only hidden again when every read succeeded; a failed
    /// pass leaves the session loading.
    pub async fn render<V: TaskView + ?Sized>(&mut self, view: &mut V) -> Result<u64, SessionError> {
        if self.contract.is_none() {
            return Err(SessionError::NotBound);
        }
        self.set_loading(view, true);
        self.phase = Phase::Rendering;

        let rendered = match &self.contract {
            Some(contract) => render_tasks(contract, view).await,
            None => return Err(SessionError::NotBound),
        };

        match rendered {
            Ok(count) => {
                self.set_loading(view, false);
                self.phase = Phase::Ready;
                Ok(count)
            }
            Err(err) => {
                warn!("render pass failed: {err}");
                Err(self.fail_contract(err))
            }
        }
    }

    pub async fn create_task(&self, content: &str) -> Result<String, SessionError> {
        let contract = self.contract.as_ref().ok_or(SessionError::NotBound)?;
        contract
            .create_task(content)
            .await
            .map_err(|source| SessionError::Contract {
                phase: self.phase,
                source,
            })
    }

    pub async fn toggle_completed(&self, index: u64) -> Result<String, SessionError> {
        let contract = self.contract.as_ref().ok_or(SessionError::NotBound)?;
        contract
            .toggle_completed(index)
            .await
            .map_err(|source| SessionError::Contract {
                phase: self.phase,
                source,
            })
    }
}

impl<P: Eip1193 + Clone> Session<RpcTodoList<P>> {
    /// Full pipeline: authorize, then resolve the account and bind the
    /// contract concurrently, then render.
    pub async fn load<S, V>(
        &mut self,
        detected: Detected<P>,
        source: &S,
        artifact_path: &str,
        view: &mut V,
    ) -> Result<u64, SessionError>
    where
        S: ArtifactSource + ?Sized,
        V: TaskView + ?Sized,
    {
        self.phase = Phase::WalletConnecting;
        let connected = match td_provider::connect(detected).await {
            Ok(connected) => connected,
            Err(err) => return Err(self.fail_provider(err)),
        };
        let provider = connected.provider;

        // Still WalletConnecting: the session is Bound only once both halves succeed.
        let phase = self.phase;
        let account = async {
            td_provider::resolve_account(&provider)
                .await
                .map_err(|source| SessionError::Provider { phase, source })
        };
        let contract = async {
            td_contract_client::load_contract(source, artifact_path, provider.clone())
                .await
                .map_err(|source| SessionError::Contract { phase, source })
        };

        let (account, contract) = match futures::try_join!(account, contract) {
            Ok(pair) => pair,
            Err(err) => {
                self.phase = Phase::Failed;
                return Err(err);
            }
        };

        info!(%account, address = contract.address(), "session bound");
        view.set_account(&account.0);
        self.contract = Some(contract.with_sender(&account));
        self.account = Some(account);
        self.phase = Phase::Bound;

        self.render(view).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::rc::Rc;
    use td_api_types::{ContractArtifact, Task};
    use td_contract_client::TODO_LIST_ARTIFACT;
    use td_contract_memory::{DEFAULT_ACCOUNT, DevChain, DevChainConfig, MemoryProvider};

    type DevSession = Session<RpcTodoList<Rc<MemoryProvider>>>;

    #[derive(Default)]
    struct RecordingView {
        account: Option<String>,
        pending: Vec<Task>,
        completed: Vec<Task>,
        loader_visible: bool,
        content_visible: bool,
    }

    impl TaskView for RecordingView {
        fn set_account(&mut self, account: &str) {
            self.account = Some(account.to_owned());
        }
        fn append_pending(&mut self, task: &Task) {
            self.pending.push(task.clone());
        }
        fn append_completed(&mut self, task: &Task) {
            self.completed.push(task.clone());
        }
        fn show_loader(&mut self) {
            self.loader_visible = true;
            self.content_visible = false;
        }
        fn show_content(&mut self) {
            self.loader_visible = false;
            self.content_visible = true;
        }
    }

    struct FixedSource(ContractArtifact);

    #[async_trait(?Send)]
    impl ArtifactSource for FixedSource {
        async fn fetch_artifact(&self, _path: &str) -> Result<ContractArtifact, ContractError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait(?Send)]
    impl ArtifactSource for FailingSource {
        async fn fetch_artifact(&self, path: &str) -> Result<ContractArtifact, ContractError> {
            Err(ContractError::Artifact(format!("GET {path}: HTTP 404")))
        }
    }

    /// Contract whose reads fail past the first `healthy_reads` task reads.
    struct FlakyContract {
        count: u64,
        healthy_reads: u64,
        reads: std::cell::Cell<u64>,
    }

    #[async_trait(?Send)]
    impl TodoList for FlakyContract {
        fn address(&self) -> &str {
            "0xflaky"
        }
        async fn task_count(&self) -> Result<u64, ContractError> {
            Ok(self.count)
        }
        async fn task(&self, index: u64) -> Result<Task, ContractError> {
            let reads = self.reads.get();
            self.reads.set(reads + 1);
            if reads >= self.healthy_reads {
                return Err(ProviderError::Transport("connection reset".to_owned()).into());
            }
            Ok(Task {
                id: index,
                content: format!("task {index}"),
                done: index % 2 == 1,
            })
        }
        async fn create_task(&self, _content: &str) -> Result<String, ContractError> {
            Ok("0x0".to_owned())
        }
        async fn toggle_completed(&self, _index: u64) -> Result<String, ContractError> {
            Ok("0x0".to_owned())
        }
    }

    fn dev_provider(config: DevChainConfig) -> (Rc<MemoryProvider>, FixedSource) {
        let chain = DevChain::new(config);
        let source = FixedSource(chain.artifact());
        (Rc::new(MemoryProvider::new(chain)), source)
    }

    #[tokio::test]
    async fn load_selects_first_account_and_renders_single_task() -> anyhow::Result<()> {
        let (provider, source) = dev_provider(DevChainConfig {
            accounts: vec![DEFAULT_ACCOUNT.to_owned(), "0xsecond".to_owned()],
            ..DevChainConfig::default()
        });
        let mut session = DevSession::new();
        let mut view = RecordingView::default();

        let rendered = session
            .load(td_provider::detect(Some(provider.clone()), None), &source, TODO_LIST_ARTIFACT, &mut view)
            .await?;

        assert_eq!(rendered, 1);
        assert_eq!(session.account(), Some(&WalletAddress(DEFAULT_ACCOUNT.to_owned())));
        assert_eq!(view.account.as_deref(), Some(DEFAULT_ACCOUNT));
        assert_eq!(view.pending.len(), 1);
        assert!(view.completed.is_empty());
        assert_eq!(session.phase(), Phase::Ready);
        assert!(!session.loading());
        assert!(view.content_visible && !view.loader_visible);

        let reads: Vec<String> = provider
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("eth_call:tasks("))
            .collect();
        assert_eq!(reads, vec!["eth_call:tasks(0)"]);
        Ok(())
    }

    #[tokio::test]
    async fn completed_tasks_land_in_completed_list() -> anyhow::Result<()> {
        let (provider, source) = dev_provider(DevChainConfig::default());
        let mut session = DevSession::new();
        let mut view = RecordingView::default();
        session
            .load(td_provider::detect(Some(provider.clone()), None), &source, TODO_LIST_ARTIFACT, &mut view)
            .await?;

        session.toggle_completed(0).await?;
        session.create_task("hello world").await?;

        let mut fresh = RecordingView::default();
        assert_eq!(session.render(&mut fresh).await?, 2);
        assert_eq!(fresh.completed.len(), 1);
        assert_eq!(fresh.completed[0].id, 0);
        assert_eq!(fresh.pending[0].content, "hello world");
        Ok(())
    }

    #[tokio::test]
    async fn re_render_appends_rows_again() -> anyhow::Result<()> {
        let (provider, source) = dev_provider(DevChainConfig::default());
        let mut session = DevSession::new();
        let mut view = RecordingView::default();
        session
            .load(td_provider::detect(None, Some(provider)), &source, TODO_LIST_ARTIFACT, &mut view)
            .await?;
        session.render(&mut view).await?;

        assert_eq!(view.pending.len(), 2);
        assert!(!session.loading());
        Ok(())
    }

    #[tokio::test]
    async fn failed_render_leaves_loading_on() {
        let contract = FlakyContract {
            count: 3,
            healthy_reads: 1,
            reads: std::cell::Cell::new(0),
        };
        let mut session = Session::bound(WalletAddress("0xaaa".to_owned()), contract);
        let mut view = RecordingView::default();

        let err = session.render(&mut view).await.unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Rendering));
        assert_eq!(session.phase(), Phase::Failed);
        assert!(session.loading());
        assert!(view.loader_visible);
        assert_eq!(view.pending.len(), 1);
    }

    #[tokio::test]
    async fn successful_re_render_clears_loading() -> anyhow::Result<()> {
        let contract = FlakyContract {
            count: 2,
            healthy_reads: 4,
            reads: std::cell::Cell::new(0),
        };
        let mut session = Session::bound(WalletAddress("0xaaa".to_owned()), contract);
        let mut view = RecordingView::default();

        session.render(&mut view).await?;
        session.render(&mut view).await?;
        assert!(!session.loading());
        assert_eq!(view.pending.len() + view.completed.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn denied_authorization_stops_before_binding() {
        let (provider, source) = dev_provider(DevChainConfig {
            deny_authorization: true,
            ..DevChainConfig::default()
        });
        let mut session = DevSession::new();
        let mut view = RecordingView::default();

        let err = session
            .load(td_provider::detect(Some(provider.clone()), None), &source, TODO_LIST_ARTIFACT, &mut view)
            .await
            .unwrap_err();

        assert!(err.is_authorization_denied());
        assert_eq!(err.phase(), Some(Phase::WalletConnecting));
        assert_eq!(session.phase(), Phase::Failed);
        assert!(session.account().is_none());
        assert_eq!(provider.calls(), vec!["eth_requestAccounts"]);
    }

    #[tokio::test]
    async fn missing_provider_is_reported() {
        let source = FailingSource;
        let mut session = DevSession::new();
        let mut view = RecordingView::default();
        let err = session
            .load(Detected::Absent, &source, TODO_LIST_ARTIFACT, &mut view)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Provider {
                source: ProviderError::ProviderUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn artifact_failure_propagates() {
        let (provider, _) = dev_provider(DevChainConfig::default());
        let mut session = DevSession::new();
        let mut view = RecordingView::default();
        let err = session
            .load(td_provider::detect(Some(provider), None), &FailingSource, TODO_LIST_ARTIFACT, &mut view)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Contract {
                source: ContractError::Artifact(_),
                ..
            }
        ));
        assert_eq!(err.phase(), Some(Phase::WalletConnecting));
        assert_eq!(session.phase(), Phase::Failed);
        assert!(view.pending.is_empty());
        assert!(!view.loader_visible);
    }

    #[tokio::test]
    async fn empty_account_list_halts_the_pipeline() {
        let (provider, source) = dev_provider(DevChainConfig {
            accounts: Vec::new(),
            ..DevChainConfig::default()
        });
        let mut session = DevSession::new();
        let mut view = RecordingView::default();
        let err = session
            .load(td_provider::detect(Some(provider), None), &source, TODO_LIST_ARTIFACT, &mut view)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Provider {
                source: ProviderError::NoAccounts,
                ..
            }
        ));
        assert_eq!(err.phase(), Some(Phase::WalletConnecting));
        assert!(session.contract().is_none());
    }
}

//! Wallet provider access: detection, authorization and account selection.
//!
//! Every provider is reached through the EIP-1193 `request` surface, so the
//! browser-injected object, an HTTP node and the in-process dev chain are
//! interchangeable behind [`Eip1193`].

use async_trait::async_trait;
use serde_json::{Value, json};
use std::rc::Rc;
use td_api_types::{NetworkId, RpcErrorObject, USER_REJECTED_REQUEST, WalletAddress};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const NO_PROVIDER_MESSAGE: &str =
    "Non-Ethereum browser detected. You should consider trying MetaMask!";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Non-Ethereum browser detected. You should consider trying MetaMask!")]
    ProviderUnavailable,
    #[error("User denied account access...")]
    AuthorizationDenied,
    #[error("provider returned no authorized accounts")]
    NoAccounts,
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl From<RpcErrorObject> for ProviderError {
    fn from(err: RpcErrorObject) -> Self {
        ProviderError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

#[async_trait(?Send)]
pub trait Eip1193 {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

#[async_trait(?Send)]
impl<P: Eip1193 + ?Sized> Eip1193 for Rc<P> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        (**self).request(method, params).await
    }
}

#[async_trait(?Send)]
impl<'a, P: Eip1193 + ?Sized> Eip1193 for &'a P {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        (**self).request(method, params).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// EIP-1193 provider that gates accounts behind `eth_requestAccounts`.
    Modern,
    /// Pre-EIP-1102 provider; accounts are always exposed.
    Legacy,
}

#[derive(Debug)]
pub enum Detected<P> {
    Found(ProviderKind, P),
    Absent,
}

/// Pick the provider to use: the modern injected object wins over the legacy one.
pub fn detect<P>(modern: Option<P>, legacy: Option<P>) -> Detected<P> {
    match (modern, legacy) {
        (Some(p), _) => Detected::Found(ProviderKind::Modern, p),
        (None, Some(p)) => Detected::Found(ProviderKind::Legacy, p),
        (None, None) => Detected::Absent,
    }
}

#[derive(Debug)]
pub struct Connected<P> {
    pub kind: ProviderKind,
    pub provider: P,
}

/// Authorize against the detected provider.
///
/// A rejected authorization request comes back as
/// [`ProviderError::AuthorizationDenied`]; nothing is retried.
pub async fn connect<P: Eip1193>(detected: Detected<P>) -> Result<Connected<P>, ProviderError> {
    let (kind, provider) = match detected {
        Detected::Found(kind, provider) => (kind, provider),
        Detected::Absent => {
            warn!("{NO_PROVIDER_MESSAGE}");
            return Err(ProviderError::ProviderUnavailable);
        }
    };

    if kind == ProviderKind::Modern {
        match provider.request("eth_requestAccounts", json!([])).await {
            Ok(_) => info!("account access granted"),
            Err(ProviderError::Rpc { code, .. }) if code == USER_REJECTED_REQUEST => {
                warn!("user denied account access");
                return Err(ProviderError::AuthorizationDenied);
            }
            Err(err) => return Err(err),
        }
    } else {
        debug!("legacy provider, accounts always exposed");
    }

    Ok(Connected { kind, provider })
}

pub async fn accounts<P: Eip1193 + ?Sized>(provider: &P) -> Result<Vec<WalletAddress>, ProviderError> {
    let value = provider.request("eth_accounts", json!([])).await?;
    let list = value
        .as_array()
        .ok_or_else(|| ProviderError::Decode(format!("eth_accounts: expected array, got {value}")))?;

    list.iter()
        .map(|entry| {
            entry
                .as_str()
                .map(|s| WalletAddress(s.to_owned()))
                .ok_or_else(|| ProviderError::Decode(format!("eth_accounts: non-string entry {entry}")))
        })
        .collect()
}

/// The active account is the first authorized one.
pub async fn resolve_account<P: Eip1193 + ?Sized>(provider: &P) -> Result<WalletAddress, ProviderError> {
    accounts(provider)
        .await?
        .into_iter()
        .next()
        .ok_or(ProviderError::NoAccounts)
}

pub async fn network_id<P: Eip1193 + ?Sized>(provider: &P) -> Result<NetworkId, ProviderError> {
    let value = provider.request("net_version", json!([])).await?;
    match value {
        Value::String(s) => Ok(NetworkId(s)),
        Value::Number(n) => Ok(NetworkId(n.to_string())),
        other => Err(ProviderError::Decode(format!("net_version: {other}"))),
    }
}

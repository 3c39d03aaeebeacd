use anyhow::{Context, Result};
use std::net::SocketAddr;
use td_contract_memory::{DEFAULT_ACCOUNT, DEFAULT_CONTRACT_ADDRESS, DEFAULT_NETWORK_ID, DevChainConfig};

pub(crate) const DEFAULT_ADDR: &str = "0.0.0.0:7545";

/// Runtime settings, read from the environment at startup.
///
/// `DEVNODE_ADDR`, `DEVNODE_NETWORK_ID`, `DEVNODE_ACCOUNTS` (comma separated)
/// and `DEVNODE_DENY_AUTH` (`1`/`true` rejects `eth_requestAccounts`).
#[derive(Debug, Clone)]
pub(crate) struct DevnodeConfig {
    pub(crate) addr: SocketAddr,
    pub(crate) chain: DevChainConfig,
}

impl DevnodeConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let addr_raw = get("DEVNODE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = addr_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid DEVNODE_ADDR: {addr_raw}"))?;

        let network_id = get("DEVNODE_NETWORK_ID").unwrap_or_else(|| DEFAULT_NETWORK_ID.to_owned());
        network_id
            .parse::<u64>()
            .with_context(|| format!("DEVNODE_NETWORK_ID must be numeric: {network_id}"))?;

        let accounts = match get("DEVNODE_ACCOUNTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_lowercase)
                .collect(),
            None => vec![DEFAULT_ACCOUNT.to_owned()],
        };

        let deny_authorization = matches!(
            get("DEVNODE_DENY_AUTH").as_deref(),
            Some("1") | Some("true") | Some("yes")
        );

        Ok(Self {
            addr,
            chain: DevChainConfig {
                network_id,
                accounts,
                contract_address: DEFAULT_CONTRACT_ADDRESS.to_owned(),
                deny_authorization,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<DevnodeConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        DevnodeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() -> Result<()> {
        let cfg = config(&[])?;
        assert_eq!(cfg.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(cfg.chain.network_id, DEFAULT_NETWORK_ID);
        assert_eq!(cfg.chain.accounts, vec![DEFAULT_ACCOUNT.to_owned()]);
        assert!(!cfg.chain.deny_authorization);
        Ok(())
    }

    #[test]
    fn accounts_and_denial_from_environment() -> Result<()> {
        let cfg = config(&[
            ("DEVNODE_ACCOUNTS", "0xAAA, ,0xbbb"),
            ("DEVNODE_DENY_AUTH", "1"),
            ("DEVNODE_NETWORK_ID", "1337"),
        ])?;
        assert_eq!(cfg.chain.accounts, vec!["0xaaa".to_owned(), "0xbbb".to_owned()]);
        assert!(cfg.chain.deny_authorization);
        assert_eq!(cfg.chain.network_id, "1337");
        Ok(())
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("DEVNODE_ADDR", "nope")]).is_err());
        assert!(config(&[("DEVNODE_NETWORK_ID", "dev")]).is_err());
    }
}

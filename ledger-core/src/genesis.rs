//! Bootstrap configuration loaded once at node start.

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{LedgerError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// The immutable bootstrap configuration for a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    pub date: DateTime<Utc>,
    pub chain_id: u16,
    pub trans_per_block: u16,
    pub difficulty: u16,
    pub mining_reward: i64,
    pub gas_price: i64,
    pub balances: BTreeMap<String, i64>,
}

impl Genesis {
    /// Loads and validates a genesis document from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LedgerError::InvalidGenesis(e.to_string()))?;
        Self::from_json(&raw)
    }

    /// Parses and validates a genesis document from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self> {
        let genesis: Genesis =
            serde_json::from_str(raw).map_err(|e| LedgerError::InvalidGenesis(e.to_string()))?;

        for key in genesis.balances.keys() {
            AccountId::new(key.clone())
                .map_err(|_| LedgerError::InvalidGenesis(format!("invalid balance key: {key}")))?;
        }

        Ok(genesis)
    }

    /// Balances as validated `AccountId`s, for handing to the account
    /// database at startup.
    pub fn account_balances(&self) -> Vec<(AccountId, i64)> {
        self.balances
            .iter()
            .filter_map(|(k, v)| AccountId::new(k.clone()).ok().map(|id| (id, *v)))
            .collect()
    }
}

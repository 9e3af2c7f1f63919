//! Account identifiers and balances.

use serde::{Deserialize, Deserializer, Serialize};
use shared::{LedgerError, Result};
use std::fmt;

const ADDRESS_BYTES: usize = 20;

/// A 20-byte secp256k1 address, hex-encoded with a `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountId(String);

// Deserialize is hand-written (rather than `#[serde(transparent)]` derived)
// so that an address arriving over the wire — HTTP submissions, genesis
// files, block-store round trips — goes through the same validation and
// lowercase canonicalisation as `AccountId::new`, instead of constructing
// the tuple field directly and bypassing both.
impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        AccountId::new(raw).map_err(serde::de::Error::custom)
    }
}

impl AccountId {
    /// Validates and wraps a hex string as an `AccountId`. Mixed-case input
    /// (e.g. an EIP-55-checksummed address) is accepted but canonicalised
    /// to lowercase on storage, so two spellings of the same address always
    /// compare, hash, and sort equal — required for the account map and
    /// `state_root` to be consistent regardless of how an address was
    /// supplied.
    pub fn new(hex_str: impl Into<String>) -> Result<Self> {
        let hex_str = hex_str.into();
        let candidate = AccountId(hex_str);
        if !candidate.is_valid() {
            return Err(LedgerError::InvalidAccountId(candidate.0));
        }
        Ok(AccountId(candidate.0.to_lowercase()))
    }

    /// `true` iff the value is `"0x"` followed by exactly 40 hex characters.
    pub fn is_valid(&self) -> bool {
        let body = match self.0.strip_prefix("0x") {
            Some(rest) => rest,
            None => return false,
        };
        body.len() == ADDRESS_BYTES * 2 && body.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account's on-chain balance and transaction counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub nonce: u64,
    pub balance: i64,
}

impl Account {
    pub fn new(id: AccountId, balance: i64) -> Self {
        Self {
            id,
            nonce: 0,
            balance,
        }
    }
}

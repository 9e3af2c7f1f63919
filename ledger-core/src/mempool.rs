//! Pending-transaction pool with replace-by-fee.

use shared::{LedgerError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::account::AccountId;
use crate::transaction::BlockTx;

/// Minimum percentage bump a replacement transaction's tip must clear over
/// the one it displaces.
const REPLACE_BY_FEE_BUMP_PERCENT: u64 = 10;

fn key(from: &AccountId, nonce: u64) -> String {
    format!("{from}:{nonce}")
}

/// Keyed by `"from:nonce"` so a second transaction from the same account at
/// the same nonce either replaces or is rejected, never coexists.
pub struct Mempool {
    entries: RwLock<HashMap<String, BlockTx>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts `tx`, or replaces the existing transaction at the same
    /// `(from, nonce)` key if `tx`'s tip beats it by at least
    /// [`REPLACE_BY_FEE_BUMP_PERCENT`].
    pub fn upsert(&self, tx: BlockTx) -> Result<()> {
        let k = key(tx.from(), tx.nonce());
        let mut guard = self.entries.write().expect("mempool lock poisoned");

        if let Some(existing) = guard.get(&k) {
            // ceil(existing.tip * 1.10), computed without floating point.
            let required =
                (existing.tip() * (100 + REPLACE_BY_FEE_BUMP_PERCENT) + 99) / 100;
            if tx.tip() < required {
                return Err(LedgerError::ReplaceUnderpriced);
            }
        }

        guard.insert(k, tx);
        Ok(())
    }

    pub fn remove(&self, from: &AccountId, nonce: u64) {
        let mut guard = self.entries.write().expect("mempool lock poisoned");
        guard.remove(&key(from, nonce));
    }

    /// Drops every entry for which `keep(tx)` returns `false`.
    pub fn truncate(&self, keep: impl Fn(&BlockTx) -> bool) {
        let mut guard = self.entries.write().expect("mempool lock poisoned");
        guard.retain(|_, tx| keep(tx));
    }

    pub fn count(&self) -> usize {
        self.entries.read().expect("mempool lock poisoned").len()
    }

    /// A snapshot of every pending transaction, in no particular order —
    /// callers that need an ordering run it through a [`crate::selector`].
    pub fn all(&self) -> Vec<BlockTx> {
        self.entries
            .read()
            .expect("mempool lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature;
    use crate::transaction::Tx;
    use secp256k1::rand::thread_rng;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn account(byte: u8) -> AccountId {
        AccountId::new(format!("0x{}", hex::encode([byte; 20]))).unwrap()
    }

    fn signed_tx(from_secret: &SecretKey, to: AccountId, tip: u64, nonce: u64) -> BlockTx {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, from_secret);
        let from = signature::address_from_public_key(&public_key);
        let tx = Tx::new(from, to, 100, tip, 1, vec![], nonce).unwrap();
        let signed = tx.sign(from_secret).unwrap();
        BlockTx::new(signed, 1, 1)
    }

    #[test]
    fn replacement_below_bump_threshold_is_rejected() {
        let pool = Mempool::new();
        let secret = SecretKey::new(&mut thread_rng());
        let to = account(0xBB);

        pool.upsert(signed_tx(&secret, to.clone(), 100, 0)).unwrap();
        let result = pool.upsert(signed_tx(&secret, to, 105, 0));
        assert!(matches!(result, Err(LedgerError::ReplaceUnderpriced)));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn replacement_above_bump_threshold_succeeds() {
        let pool = Mempool::new();
        let secret = SecretKey::new(&mut thread_rng());
        let to = account(0xBB);

        pool.upsert(signed_tx(&secret, to.clone(), 100, 0)).unwrap();
        pool.upsert(signed_tx(&secret, to, 111, 0)).unwrap();
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn bump_threshold_rounds_up_not_down() {
        // ceil(11 * 1.10) == 13, not 12 — a naive truncating computation
        // would wrongly accept 12.
        let pool = Mempool::new();
        let secret = SecretKey::new(&mut thread_rng());
        let to = account(0xBB);

        pool.upsert(signed_tx(&secret, to.clone(), 11, 0)).unwrap();
        let result = pool.upsert(signed_tx(&secret, to.clone(), 12, 0));
        assert!(matches!(result, Err(LedgerError::ReplaceUnderpriced)));

        pool.upsert(signed_tx(&secret, to, 13, 0)).unwrap();
        assert_eq!(pool.count(), 1);
    }
}

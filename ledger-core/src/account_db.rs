//! The in-memory account ledger: balances, nonces, and the state root.

use sha2::{Digest, Sha256};
use shared::{LedgerError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::account::{Account, AccountId};
use crate::transaction::BlockTx;

/// Thread-safe account store. Mutating operations take the write lock for
/// the shortest span that keeps balance + nonce updates atomic.
pub struct AccountDb {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl AccountDb {
    pub fn new(genesis_balances: Vec<(AccountId, i64)>) -> Self {
        let mut accounts = HashMap::new();
        for (id, balance) in genesis_balances {
            accounts.insert(id.clone(), Account::new(id, balance));
        }
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// Looks up a single account. An id with no recorded activity —
    /// never credited by genesis, a transfer, or a mining reward — has no
    /// entry in the map and is reported as `NotFound`.
    pub fn query(&self, id: &AccountId) -> Result<Account> {
        let guard = self.accounts.read().expect("account db lock poisoned");
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("account {id}")))
    }

    /// A snapshot of every account with recorded activity, sorted by
    /// `AccountId` ascending.
    pub fn all(&self) -> Vec<Account> {
        let guard = self.accounts.read().expect("account db lock poisoned");
        let mut out: Vec<Account> = guard.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// The next nonce a new transaction from `id` must use; an id with no
    /// history starts at nonce 0.
    pub fn next_nonce(&self, id: &AccountId) -> u64 {
        self.query(id).map(|a| a.nonce).unwrap_or(0) + 1
    }

    /// Applies a transaction's balance effects. The fee (`gas_units *
    /// gas_price`) is charged to `from` and paid to `beneficiary`
    /// unconditionally, even when the account cannot also afford
    /// `value + tip`. `from`'s nonce is left untouched — nonce uniqueness
    /// for mempool replacement is enforced by the mempool key, not by this
    /// counter (see the nonce note on `Account`). A single write-lock
    /// section covers all account updates.
    pub fn apply_transaction(&self, tx: &BlockTx, beneficiary: &AccountId) -> Result<()> {
        let from_id = tx.from().clone();
        let to_id = tx.signed_tx.tx.to.clone();
        let fee = tx.fee() as i64;
        let tip = tx.tip() as i64;
        let value = tx.signed_tx.tx.value as i64;

        let mut guard = self.accounts.write().expect("account db lock poisoned");

        let from = guard
            .entry(from_id.clone())
            .or_insert_with(|| Account::new(from_id.clone(), 0));

        if from.balance < value + tip + fee {
            from.balance -= fee;
            let ben = guard
                .entry(beneficiary.clone())
                .or_insert_with(|| Account::new(beneficiary.clone(), 0));
            ben.balance += fee;
            return Err(LedgerError::InsufficientFunds);
        }

        let from = guard.get_mut(&from_id).expect("from account just inserted");
        from.balance -= value + tip + fee;

        let to = guard
            .entry(to_id.clone())
            .or_insert_with(|| Account::new(to_id, 0));
        to.balance += value;

        let ben = guard
            .entry(beneficiary.clone())
            .or_insert_with(|| Account::new(beneficiary.clone(), 0));
        ben.balance += tip + fee;

        Ok(())
    }

    /// Credits `beneficiary` with `reward`, creating the account if needed.
    pub fn apply_mining_reward(&self, beneficiary: &AccountId, reward: i64) {
        let mut guard = self.accounts.write().expect("account db lock poisoned");
        let account = guard
            .entry(beneficiary.clone())
            .or_insert_with(|| Account::new(beneficiary.clone(), 0));
        account.balance += reward;
    }

    /// SHA-256 over the canonical JSON of every account, sorted by
    /// `AccountId` ascending so the root is independent of insertion order.
    pub fn state_root(&self) -> String {
        let accounts = self.all();
        let mut hasher = Sha256::new();
        for account in &accounts {
            let encoded = serde_json::to_vec(account).expect("account always serialises");
            hasher.update(&encoded);
        }
        format!("0x{}", hex::encode(hasher.finalize()))
    }
}

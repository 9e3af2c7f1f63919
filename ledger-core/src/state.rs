//! Ties the genesis config, account database, mempool and block store
//! together behind the operations a node actually performs.

use chrono::Utc;
use shared::{LedgerError, Result};
use std::sync::{Mutex, RwLock};

use crate::account::AccountId;
use crate::account_db::AccountDb;
use crate::block::{Block, BlockHeader};
use crate::genesis::Genesis;
use crate::mempool::Mempool;
use crate::merkle::MerkleTree;
use crate::pow;
use crate::selector::{self, Strategy};
use crate::store::BlockStore;
use crate::transaction::{BlockTx, SignedTx};

/// The node's full local view of the chain: genesis parameters, account
/// balances, the pending-transaction pool, and persisted blocks.
///
/// `latest` is guarded separately from the account database so a reader
/// asking "what's the current block number" never blocks behind an
/// in-flight account mutation.
pub struct State {
    pub genesis: Genesis,
    pub accounts: AccountDb,
    pub mempool: Mempool,
    pub store: BlockStore,
    latest: RwLock<Option<BlockHeader>>,
    /// Serialises `validate_block → apply → persist → latest` as one
    /// critical section, so two concurrent `update_block` callers (e.g. a
    /// locally mined block racing a peer-submitted one) can't both
    /// validate against the same tip and then both apply their block —
    /// the per-account lock in `AccountDb` only protects individual
    /// updates, not the whole sequence.
    block_lock: Mutex<()>,
    /// Narrow hook into the mining worker, installed after construction
    /// (see the State/Worker wiring note in `Worker::spawn`) so `State`
    /// never needs to know the worker's type, only that it can be nudged.
    mining_trigger: RwLock<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl State {
    pub fn new(genesis: Genesis, store: BlockStore) -> Result<Self> {
        let accounts = AccountDb::new(genesis.account_balances());
        let latest = store.latest_number()?.and_then(|n| {
            store
                .find(n)
                .ok()
                .flatten()
                .map(|block| block.header)
        });

        let state = Self {
            genesis,
            accounts,
            mempool: Mempool::new(),
            store,
            latest: RwLock::new(latest),
            block_lock: Mutex::new(()),
            mining_trigger: RwLock::new(None),
        };

        state.replay_from_store()?;
        Ok(state)
    }

    /// Re-applies every persisted block's transactions and mining reward
    /// against a fresh account database, so balances survive a restart.
    fn replay_from_store(&self) -> Result<()> {
        for block in self.store.list()? {
            let beneficiary = AccountId::new(block.header.beneficiary.clone())?;
            for tx in &block.transactions {
                // InsufficientFunds still charges the fee (see account_db::apply_transaction);
                // it must not stop the rest of the block from replaying.
                match self.accounts.apply_transaction(tx, &beneficiary) {
                    Ok(()) | Err(LedgerError::InsufficientFunds) => {}
                    Err(e) => return Err(e),
                }
            }
            self.accounts
                .apply_mining_reward(&beneficiary, block.header.mining_reward);
        }
        Ok(())
    }

    pub fn latest_block_number(&self) -> u64 {
        self.latest
            .read()
            .expect("latest-block lock poisoned")
            .as_ref()
            .map(|h| h.number)
            .unwrap_or(0)
    }

    fn latest_hash(&self) -> String {
        self.latest
            .read()
            .expect("latest-block lock poisoned")
            .as_ref()
            .map(|h| h.hash())
            .unwrap_or_else(|| shared::hash::ZERO_HASH.to_string())
    }

    /// Installs the callback a mining worker wires up after `State`
    /// construction so `submit_tx` can nudge it without `State` depending
    /// on `Worker`'s type (see the design note in `worker::Worker::spawn`).
    pub fn set_mining_trigger(&self, trigger: Box<dyn Fn() + Send + Sync>) {
        *self
            .mining_trigger
            .write()
            .expect("mining-trigger lock poisoned") = Some(trigger);
    }

    /// Validates a signed transaction and queues it in the mempool. If the
    /// mempool has reached the genesis's per-block transaction budget, fires
    /// the installed mining trigger (non-blocking, coalesced by the
    /// receiver — see `Worker::start_mining`).
    pub fn submit_tx(&self, signed: SignedTx, gas_units: u64) -> Result<()> {
        signed.is_valid()?;
        let block_tx = BlockTx::new(signed, self.genesis.gas_price as u64, gas_units);
        self.mempool.upsert(block_tx)?;

        if self.mempool.count() >= self.genesis.trans_per_block as usize {
            if let Some(trigger) = self
                .mining_trigger
                .read()
                .expect("mining-trigger lock poisoned")
                .as_ref()
            {
                trigger();
            }
        }
        Ok(())
    }

    /// Selects pending transactions, mines a block over them, applies it,
    /// persists it, and prunes the mempool — the full block-production
    /// cycle a mining worker drives on each cycle.
    pub fn mine_next_block(
        &self,
        beneficiary: AccountId,
        cancel: std::sync::Arc<std::sync::atomic::AtomicBool>,
    ) -> Result<Block> {
        let pending = self.mempool.all();
        let selected = selector::select(
            pending,
            self.genesis.trans_per_block as usize,
            Strategy::AdvancedTip,
        );

        let tree = MerkleTree::new(selected.clone())?;
        let header = BlockHeader {
            number: self.latest_block_number() + 1,
            parent_hash: self.latest_hash(),
            timestamp: Utc::now(),
            beneficiary: beneficiary.as_str().to_string(),
            difficulty: self.genesis.difficulty,
            mining_reward: self.genesis.mining_reward,
            state_root: self.accounts.state_root(),
            trans_root: tree.root_hex(),
            trans_count: selected.len() as u16,
            nonce: 0,
        };

        let mined_header = pow::mine(header, self.genesis.difficulty, cancel)?;
        let block = Block {
            header: mined_header,
            transactions: selected,
        };

        self.update_block(block.clone())?;
        Ok(block)
    }

    /// Validates `block` against the current chain tip and applies it:
    /// transactions in Merkle order, then the mining reward, then
    /// persistence, then removing the included transactions from the
    /// mempool.
    ///
    /// Holds `block_lock` across the entire sequence so two concurrent
    /// callers (this node's own miner and a peer-submitted block, say)
    /// can't both validate against the same tip and then both apply —
    /// without it, validation and application would each be atomic on
    /// their own but the pair wouldn't be, opening a window for the same
    /// parent block to be extended twice.
    pub fn update_block(&self, block: Block) -> Result<()> {
        let _guard = self.block_lock.lock().expect("block lock poisoned");

        self.validate_block(&block)?;

        let beneficiary = AccountId::new(block.header.beneficiary.clone())?;
        for tx in &block.transactions {
            // Individual InsufficientFunds is recorded, not fatal to the block:
            // the fee was already charged inside apply_transaction.
            match self.accounts.apply_transaction(tx, &beneficiary) {
                Ok(()) | Err(LedgerError::InsufficientFunds) => {}
                Err(e) => return Err(e),
            }
        }

        self.accounts
            .apply_mining_reward(&beneficiary, block.header.mining_reward);

        self.store.save(&block)?;

        for tx in &block.transactions {
            self.mempool.remove(tx.from(), tx.nonce());
        }

        let mut latest = self.latest.write().expect("latest-block lock poisoned");
        *latest = Some(block.header.clone());
        Ok(())
    }

    /// Structural checks independent of the mempool: parent linkage,
    /// non-decreasing difficulty and timestamp, proof of work, and that the
    /// transaction root matches the claimed transactions.
    pub fn validate_block(&self, block: &Block) -> Result<()> {
        if block.header.number != self.latest_block_number() + 1 {
            return Err(LedgerError::InvalidBlock(format!(
                "expected block number {}, got {}",
                self.latest_block_number() + 1,
                block.header.number
            )));
        }
        if block.header.parent_hash != self.latest_hash() {
            return Err(LedgerError::InvalidBlock("parent hash mismatch".into()));
        }

        if let Some(prev) = self.latest.read().expect("latest-block lock poisoned").as_ref() {
            if block.header.difficulty < prev.difficulty {
                return Err(LedgerError::InvalidBlock(
                    "difficulty must not decrease".into(),
                ));
            }
            if block.header.timestamp < prev.timestamp {
                return Err(LedgerError::InvalidBlock(
                    "timestamp must not decrease".into(),
                ));
            }
        }

        if !pow::is_hash_solved(&block.hash(), block.header.difficulty) {
            return Err(LedgerError::InvalidBlock("insufficient proof of work".into()));
        }

        let tree = block.merkle_tree()?;
        if tree.root_hex() != block.header.trans_root {
            return Err(LedgerError::InvalidBlock("transaction root mismatch".into()));
        }

        for tx in &block.transactions {
            tx.signed_tx.is_valid()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::Genesis;
    use crate::signature;
    use crate::transaction::Tx;
    use secp256k1::rand::thread_rng;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn genesis_with(from: &AccountId, balance: i64) -> Genesis {
        let json = format!(
            r#"{{
                "date": "2024-01-01T00:00:00Z",
                "chain_id": 1,
                "trans_per_block": 10,
                "difficulty": 1,
                "mining_reward": 500,
                "gas_price": 1,
                "balances": {{ "{from}": {balance} }}
            }}"#
        );
        Genesis::from_json(&json).unwrap()
    }

    fn state_with(from: &AccountId, balance: i64) -> State {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        State::new(genesis_with(from, balance), store).unwrap()
    }

    fn keypair() -> (SecretKey, AccountId) {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut thread_rng());
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        let from = signature::address_from_public_key(&public_key);
        (secret_key, from)
    }

    #[test]
    fn submit_then_mine_applies_the_block_and_pays_the_beneficiary() {
        let (secret, from) = keypair();
        let to = AccountId::new(format!("0x{}", hex::encode([0xBBu8; 20]))).unwrap();
        let beneficiary = AccountId::new(format!("0x{}", hex::encode([0xFEu8; 20]))).unwrap();
        let state = state_with(&from, 10_000);

        let tx = Tx::new(from.clone(), to.clone(), 100, 5, 1, vec![], 0).unwrap();
        let signed = tx.sign(&secret).unwrap();
        state.submit_tx(signed, 1).unwrap();
        assert_eq!(state.mempool.count(), 1);

        let cancel = Arc::new(AtomicBool::new(false));
        let block = state.mine_next_block(beneficiary.clone(), cancel).unwrap();

        assert_eq!(block.header.number, 1);
        assert_eq!(state.latest_block_number(), 1);
        assert_eq!(state.mempool.count(), 0);
        assert_eq!(state.accounts.query(&to).unwrap().balance, 100);
        // gas_price=1, gas_units=1 => fee=1; beneficiary gets tip(5) + fee(1) + mining_reward(500).
        assert_eq!(state.accounts.query(&beneficiary).unwrap().balance, 506);
        assert_eq!(state.accounts.query(&from).unwrap().balance, 10_000 - 100 - 5 - 1);
    }

    #[test]
    fn update_block_rejects_a_difficulty_regression() {
        let (secret, from) = keypair();
        let beneficiary = AccountId::new(format!("0x{}", hex::encode([0xFEu8; 20]))).unwrap();
        let state = state_with(&from, 10_000);
        let _ = &secret;

        let cancel = Arc::new(AtomicBool::new(false));
        let first = state
            .mine_next_block(beneficiary.clone(), cancel)
            .unwrap();
        assert_eq!(first.header.difficulty, 1);

        let mut second = first.clone();
        second.header.number = 2;
        second.header.parent_hash = first.hash();
        second.header.difficulty = 0;
        second.header.trans_root = second.merkle_tree().unwrap().root_hex();

        let err = state.update_block(second).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidBlock(_)));
    }

    #[test]
    fn concurrent_update_block_applies_only_one_racing_block() {
        let (_secret, from) = keypair();
        let beneficiary = AccountId::new(format!("0x{}", hex::encode([0xFEu8; 20]))).unwrap();
        let state = Arc::new(state_with(&from, 10_000));

        let cancel = Arc::new(AtomicBool::new(false));
        let genesis_block = state
            .mine_next_block(beneficiary.clone(), Arc::clone(&cancel))
            .unwrap();

        // Two competing successors to the same parent, both otherwise valid.
        let mut candidate_a = genesis_block.clone();
        candidate_a.header.number = 2;
        candidate_a.header.parent_hash = genesis_block.hash();
        candidate_a.header.trans_root = candidate_a.merkle_tree().unwrap().root_hex();
        let solved_a = pow::mine(candidate_a.header, state.genesis.difficulty, Arc::clone(&cancel)).unwrap();
        candidate_a.header = solved_a;

        let mut candidate_b = candidate_a.clone();
        candidate_b.header.beneficiary = "0x0000000000000000000000000000000000000b".to_string();
        candidate_b.header.trans_root = candidate_b.merkle_tree().unwrap().root_hex();
        let solved_b = pow::mine(candidate_b.header, state.genesis.difficulty, Arc::clone(&cancel)).unwrap();
        candidate_b.header = solved_b;

        let state_a = Arc::clone(&state);
        let state_b = Arc::clone(&state);
        let handle_a = std::thread::spawn(move || state_a.update_block(candidate_a));
        let handle_b = std::thread::spawn(move || state_b.update_block(candidate_b));

        let result_a = handle_a.join().unwrap();
        let result_b = handle_b.join().unwrap();

        // Exactly one of the two racing blocks is accepted as block 2; the
        // other is rejected once it loses the race for `block_lock` and
        // re-validates against the now-advanced tip.
        assert_ne!(result_a.is_ok(), result_b.is_ok());
        assert_eq!(state.latest_block_number(), 2);
    }
}

//! Account-model ledger core: secp256k1-signed transactions, an
//! advanced-tip mempool selector, proof-of-work mining, and a JSON block
//! store.
//!
//! The crate is deliberately free of any networking — it exposes the
//! operations a node needs ([`State::submit_tx`], [`State::mine_next_block`],
//! [`State::validate_block`]) and leaves wiring them to an RPC/API layer up
//! to the caller.

pub mod account;
pub mod account_db;
pub mod block;
pub mod genesis;
pub mod mempool;
pub mod merkle;
pub mod pow;
pub mod selector;
pub mod signature;
pub mod state;
pub mod store;
pub mod transaction;
pub mod worker;

pub use account::{Account, AccountId};
pub use account_db::AccountDb;
pub use block::{Block, BlockHeader};
pub use genesis::Genesis;
pub use mempool::Mempool;
pub use merkle::MerkleTree;
pub use selector::Strategy;
pub use state::State;
pub use store::BlockStore;
pub use transaction::{BlockTx, SignedTx, Tx};
pub use worker::Worker;

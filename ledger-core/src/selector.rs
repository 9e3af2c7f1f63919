//! Strategies for picking which mempool transactions go into the next block.

use std::collections::HashMap;

use crate::account::AccountId;
use crate::transaction::BlockTx;

/// Named selection strategy. `AdvancedTip` is the default: it respects each
/// account's nonce ordering while maximizing total tip under the block's
/// transaction budget. `Tip` is a simpler, budget-naive strategy kept for
/// comparison and testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Tip,
    AdvancedTip,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::AdvancedTip
    }
}

/// Selects up to `budget` transactions from `pending` under `strategy`.
pub fn select(pending: Vec<BlockTx>, budget: usize, strategy: Strategy) -> Vec<BlockTx> {
    match strategy {
        Strategy::Tip => select_tip(pending, budget),
        Strategy::AdvancedTip => select_advanced_tip(pending, budget),
    }
}

/// Plain highest-tip-first truncation. Does not preserve per-account nonce
/// ordering, so callers must not treat its output as block-ready without a
/// separate ordering pass.
fn select_tip(mut pending: Vec<BlockTx>, budget: usize) -> Vec<BlockTx> {
    pending.sort_by(|a, b| b.tip().cmp(&a.tip()));
    pending.truncate(budget);
    pending
}

/// Groups `pending` by account, sorts each group by nonce ascending, and
/// searches — via depth-first search over how many leading transactions to
/// take from each account — for the prefix-length assignment that maximizes
/// total tip without exceeding `budget` transactions overall.
///
/// Because an account's transactions must be applied in nonce order, the
/// only valid choice for each account is "how many of its nonce-ordered
/// transactions to include", never an arbitrary subset — this is what
/// keeps the search to one dimension (a count) per account instead of a
/// full subset-sum over every transaction.
fn select_advanced_tip(pending: Vec<BlockTx>, budget: usize) -> Vec<BlockTx> {
    let mut by_account: HashMap<AccountId, Vec<BlockTx>> = HashMap::new();
    for tx in pending {
        by_account.entry(tx.from().clone()).or_default().push(tx);
    }

    let mut groups: Vec<Vec<BlockTx>> = by_account.into_values().collect();
    for group in &mut groups {
        group.sort_by_key(|tx| tx.nonce());
    }
    // Stable account ordering so repeated calls over the same mempool
    // contents produce the same selection.
    groups.sort_by(|a, b| a[0].from().cmp(b[0].from()));

    let prefix_tips: Vec<Vec<u64>> = groups
        .iter()
        .map(|group| {
            let mut sums = vec![0u64];
            for tx in group {
                sums.push(sums.last().unwrap() + tx.tip());
            }
            sums
        })
        .collect();

    let mut memo: HashMap<(usize, usize), (u64, Vec<usize>)> = HashMap::new();
    let (_, counts) = best_counts(&groups, &prefix_tips, 0, budget, &mut memo);

    let mut chosen = Vec::new();
    for (group, count) in groups.into_iter().zip(counts) {
        chosen.extend(group.into_iter().take(count));
    }
    chosen
}

/// Returns the best achievable `(total_tip, counts_per_remaining_group)`
/// starting at account index `idx` with `budget` transaction slots left.
fn best_counts(
    groups: &[Vec<BlockTx>],
    prefix_tips: &[Vec<u64>],
    idx: usize,
    budget: usize,
    memo: &mut HashMap<(usize, usize), (u64, Vec<usize>)>,
) -> (u64, Vec<usize>) {
    if idx == groups.len() || budget == 0 {
        return (0, vec![0; groups.len() - idx]);
    }
    if let Some(cached) = memo.get(&(idx, budget)) {
        return cached.clone();
    }

    let max_take = groups[idx].len().min(budget);
    let mut best_tip = 0u64;
    let mut best_counts = vec![0usize; groups.len() - idx];

    for take in 0..=max_take {
        let tip_here = prefix_tips[idx][take];
        let (rest_tip, rest_counts) =
            best_counts(groups, prefix_tips, idx + 1, budget - take, memo);
        let total = tip_here + rest_tip;
        if total >= best_tip {
            best_tip = total;
            best_counts = std::iter::once(take).chain(rest_counts).collect();
        }
    }

    memo.insert((idx, budget), (best_tip, best_counts.clone()));
    (best_tip, best_counts)
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

    fn tx_with(secret: &SecretKey, to: AccountId, tip: u64, nonce: u64) -> BlockTx {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, secret);
        let from = signature::address_from_public_key(&public_key);
        let tx = Tx::new(from, to, 100, tip, 1, vec![], nonce).unwrap();
        let signed = tx.sign(secret).unwrap();
        BlockTx::new(signed, 1, 1)
    }

    #[test]
    fn advanced_tip_never_exceeds_budget() {
        let to = account(0xBB);
        let secret_a = SecretKey::new(&mut thread_rng());
        let secret_b = SecretKey::new(&mut thread_rng());

        let pending = vec![
            tx_with(&secret_a, to.clone(), 10, 0),
            tx_with(&secret_a, to.clone(), 20, 1),
            tx_with(&secret_a, to.clone(), 5, 2),
            tx_with(&secret_b, to, 50, 0),
        ];

        let chosen = select(pending, 2, Strategy::AdvancedTip);
        assert!(chosen.len() <= 2);
    }

    #[test]
    fn advanced_tip_respects_nonce_prefixes_within_an_account() {
        let to = account(0xBB);
        let secret = SecretKey::new(&mut thread_rng());

        // The high-tip tx is at nonce 2; taking it requires also taking
        // nonces 0 and 1.
        let pending = vec![
            tx_with(&secret, to.clone(), 1, 0),
            tx_with(&secret, to.clone(), 1, 1),
            tx_with(&secret, to, 100, 2),
        ];

        let chosen = select(pending, 3, Strategy::AdvancedTip);
        let mut nonces: Vec<u64> = chosen.iter().map(|tx| tx.nonce()).collect();
        nonces.sort();
        assert_eq!(nonces, vec![0, 1, 2]);
    }

    #[test]
    fn tip_strategy_truncates_to_budget() {
        let to = account(0xBB);
        let secret = SecretKey::new(&mut thread_rng());
        let pending = vec![
            tx_with(&secret, to.clone(), 1, 0),
            tx_with(&secret, to, 100, 1),
        ];
        let chosen = select(pending, 1, Strategy::Tip);
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen[0].tip(), 100);
    }
}

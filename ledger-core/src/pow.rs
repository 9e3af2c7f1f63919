//! Proof-of-work nonce search with cooperative cancellation.

use rand::RngCore;
use shared::hash::leading_zero_hex_digits;
use shared::{LedgerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::block::BlockHeader;

/// How many nonce attempts pass between checks of the cancellation flag.
/// Small enough that `cancel()` takes effect quickly, large enough that
/// the atomic load doesn't dominate the hash loop.
const CANCEL_CHECK_INTERVAL: u64 = 2048;

/// `true` iff `hash_hex`'s leading hex digits are all zero, at least
/// `difficulty` of them.
pub fn is_hash_solved(hash_hex: &str, difficulty: u16) -> bool {
    leading_zero_hex_digits(hash_hex) >= difficulty as u32
}

/// Searches for a nonce that makes `header`'s hash satisfy `difficulty`,
/// starting from a random seed and incrementing. Checked periodically
/// against `cancel` so a caller can abort a long search from another
/// thread; returns [`LedgerError::MiningCancelled`] if it does.
pub fn mine(mut header: BlockHeader, difficulty: u16, cancel: Arc<AtomicBool>) -> Result<BlockHeader> {
    let mut nonce = rand::thread_rng().next_u64();
    let mut checked_since_cancel = 0u64;

    loop {
        header.nonce = nonce;
        if is_hash_solved(&header.hash(), difficulty) {
            return Ok(header);
        }

        nonce = nonce.wrapping_add(1);
        checked_since_cancel += 1;
        if checked_since_cancel >= CANCEL_CHECK_INTERVAL {
            checked_since_cancel = 0;
            if cancel.load(Ordering::Relaxed) {
                return Err(LedgerError::MiningCancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn header() -> BlockHeader {
        BlockHeader {
            number: 1,
            parent_hash: shared::hash::ZERO_HASH.to_string(),
            timestamp: Utc::now(),
            beneficiary: "0x0000000000000000000000000000000000000a".to_string(),
            difficulty: 1,
            mining_reward: 500,
            state_root: shared::hash::ZERO_HASH.to_string(),
            trans_root: shared::hash::ZERO_HASH.to_string(),
            trans_count: 0,
            nonce: 0,
        }
    }

    #[test]
    fn mines_a_block_at_low_difficulty() {
        let cancel = Arc::new(AtomicBool::new(false));
        let mined = mine(header(), 1, cancel).unwrap();
        assert!(is_hash_solved(&mined.hash(), 1));
    }

    #[test]
    fn cancellation_flag_aborts_the_search() {
        let cancel = Arc::new(AtomicBool::new(true));
        // Difficulty high enough that the loop would otherwise spin past
        // the first cancellation check.
        let result = mine(header(), 64, cancel);
        assert!(matches!(result, Err(LedgerError::MiningCancelled)));
    }

    #[test]
    fn leading_zero_counter_matches_expectations() {
        assert_eq!(leading_zero_hex_digits("0x00012abc"), 3);
        assert_eq!(leading_zero_hex_digits("0xabc"), 0);
    }
}

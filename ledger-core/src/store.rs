//! On-disk block storage: one canonical-JSON file per block number.

use shared::{LedgerError, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::block::Block;

/// Stores mined blocks as `<number>` files under a root directory, each
/// holding the block's canonical (compact) JSON encoding.
pub struct BlockStore {
    root: PathBuf,
}

impl BlockStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, number: u64) -> PathBuf {
        self.root.join(number.to_string())
    }

    pub fn save(&self, block: &Block) -> Result<()> {
        let path = self.path_for(block.header.number);
        let encoded =
            serde_json::to_vec(block).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        fs::write(&path, encoded).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        set_readable_permissions(&path)?;
        Ok(())
    }

    pub fn find(&self, number: u64) -> Result<Option<Block>> {
        let path = self.path_for(number);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read(path).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        let block =
            serde_json::from_slice(&raw).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        Ok(Some(block))
    }

    pub fn delete(&self, number: u64) -> Result<()> {
        let path = self.path_for(number);
        if path.exists() {
            fs::remove_file(path).map_err(|e| LedgerError::StorageError(e.to_string()))?;
        }
        Ok(())
    }

    /// Every stored block, read in ascending block-number order.
    pub fn list(&self) -> Result<Vec<Block>> {
        let mut numbers = self.list_numbers()?;
        numbers.sort_unstable();

        let mut blocks = Vec::with_capacity(numbers.len());
        for number in numbers {
            if let Some(block) = self.find(number)? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    fn list_numbers(&self) -> Result<Vec<u64>> {
        let mut numbers = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| LedgerError::StorageError(e.to_string()))? {
            let entry = entry.map_err(|e| LedgerError::StorageError(e.to_string()))?;
            if let Some(number) = number_from_path(&entry.path()) {
                numbers.push(number);
            }
        }
        Ok(numbers)
    }

    /// The highest stored block number, if any blocks have been saved.
    pub fn latest_number(&self) -> Result<Option<u64>> {
        Ok(self.list_numbers()?.into_iter().max())
    }
}

fn number_from_path(path: &Path) -> Option<u64> {
    path.file_name()?.to_str()?.parse().ok()
}

#[cfg(unix)]
fn set_readable_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
        .map_err(|e| LedgerError::StorageError(e.to_string()))
}

#[cfg(not(unix))]
fn set_readable_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use chrono::Utc;

    fn block(number: u64) -> Block {
        Block {
            header: BlockHeader {
                number,
                parent_hash: shared::hash::ZERO_HASH.to_string(),
                timestamp: Utc::now(),
                beneficiary: "0x0000000000000000000000000000000000000a".to_string(),
                difficulty: 1,
                mining_reward: 500,
                state_root: shared::hash::ZERO_HASH.to_string(),
                trans_root: shared::hash::ZERO_HASH.to_string(),
                trans_count: 0,
                nonce: 0,
            },
            transactions: vec![],
        }
    }

    #[test]
    fn round_trips_a_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        store.save(&block(1)).unwrap();

        let found = store.find(1).unwrap().unwrap();
        assert_eq!(found.header.number, 1);
    }

    #[test]
    fn list_returns_blocks_in_ascending_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        store.save(&block(3)).unwrap();
        store.save(&block(1)).unwrap();
        store.save(&block(2)).unwrap();

        let numbers: Vec<u64> = store.list().unwrap().iter().map(|b| b.header.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn latest_number_reflects_highest_saved_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        assert_eq!(store.latest_number().unwrap(), None);
        store.save(&block(5)).unwrap();
        assert_eq!(store.latest_number().unwrap(), Some(5));
    }

    #[cfg(unix)]
    #[test]
    fn saved_block_file_is_0644() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::open(dir.path()).unwrap();
        store.save(&block(1)).unwrap();

        let mode = std::fs::metadata(dir.path().join("1"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}

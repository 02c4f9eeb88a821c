//! Background compaction: periodically merges the two newest sorted blocks
//! into one, preserving the newest value on key collisions.

use std::sync::RwLock;

use thiserror::Error;
use tracing::info;

use crate::pair::Pair;
use crate::sstable::{builder, SortedBlock, SortedBlockError};

#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("sorted block error: {0}")]
    SortedBlock(#[from] SortedBlockError),

    #[error("lock poisoned")]
    LockPoisoned,
}

/// Runs one compaction tick under a single exclusive acquisition of
/// `disk_lock` for the entire read-modify-write window — the two newest
/// blocks are read, merged, and the list is rewritten before the lock is
/// released. A shared-mode acquisition here would race a concurrent flush
/// appending a third block mid-merge.
pub fn run_once(disk_lock: &RwLock<Vec<SortedBlock>>) -> Result<(), CompactionError> {
    let mut blocks = disk_lock.write().map_err(|_| CompactionError::LockPoisoned)?;
    if blocks.len() < 2 {
        return Ok(());
    }

    let newest = blocks.pop().expect("len >= 2");
    let older = blocks.pop().expect("len >= 2");

    let merged_pairs = merge_newer_wins(older.enumerate()?, newest.enumerate()?);
    let merged_block = builder::build(merged_pairs)?;

    info!(
        before = older.len() + newest.len(),
        after = merged_block.len(),
        "compacted two sorted blocks"
    );
    blocks.push(merged_block);
    Ok(())
}

/// Two-pointer merge of two key-ascending sequences. On equal keys, the
/// pair from `newer` is kept and both cursors advance — favoring the newer
/// input on collision, the correct LSM tie-break.
fn merge_newer_wins(older: Vec<Pair>, newer: Vec<Pair>) -> Vec<Pair> {
    let mut out = Vec::with_capacity(older.len() + newer.len());
    let mut i = 0;
    let mut j = 0;

    while i < older.len() && j < newer.len() {
        match older[i].key.cmp(&newer[j].key) {
            std::cmp::Ordering::Less => {
                out.push(older[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(newer[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(newer[j].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&older[i..]);
    out.extend_from_slice(&newer[j..]);
    out
}

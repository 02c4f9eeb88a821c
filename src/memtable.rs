//! # Memtable Module
//!
//! The in-memory, ordered write buffer of the storage engine (component C1).
//!
//! ## Design Invariants
//!
//! - Keys are unique; a `put` overwrites any prior pair for that key and
//!   clears its tombstone.
//! - A `delete` on a key that is present flips its tombstone bit in place;
//!   the key is retained so later reads can stop at this level without
//!   falling through to older, stale data. A `delete` on an absent key is a
//!   no-op — the deletion is captured by the write-ahead log and resolved
//!   later by compaction.
//! - `size()` counts only *live* (non-tombstoned) keys. The reference
//!   implementation this design is adapted from increments its size counter
//!   on every delete, including deletes of already-tombstoned or absent
//!   keys; that inflates the flush trigger and is not reproduced here (see
//!   `DESIGN.md`).
//!
//! ## Concurrency
//!
//! Internally synchronized with a single `RwLock` around an ordered
//! `BTreeMap`. Writers (`insert`, `delete`) take the write side; readers
//! (`find`, `enumerate`) take the read side. The LSM coordinator (C4) layers
//! its own `memtable_lock` semantics on top of this for the active/frozen
//! freeze protocol; this module only guarantees internal consistency of a
//! single table.

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::trace;

use crate::pair::Pair;

/// Errors returned by [`Memtable`] operations.
#[derive(Debug, Error)]
pub enum MemtableError {
    /// Internal invariant violation (poisoned lock).
    #[error("internal error: {0}")]
    Internal(String),
}

/// The mutable, in-memory write buffer of the storage engine.
#[derive(Debug, Default)]
pub struct Memtable {
    inner: RwLock<BTreeMap<String, Pair>>,
    live_count: RwLock<usize>,
}

impl Memtable {
    /// Creates a new, empty memtable.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
            live_count: RwLock::new(0),
        }
    }

    /// Inserts or overwrites a key, clearing any prior tombstone.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), MemtableError> {
        let key = key.into();
        trace!(%key, "memtable insert");

        let mut table = self
            .inner
            .write()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        let mut live = self
            .live_count
            .write()
            .map_err(|_| MemtableError::Internal("live-count lock poisoned".into()))?;

        let was_live = table.get(&key).is_some_and(|p| !p.tombstone);
        table.insert(key.clone(), Pair::new(key, value));
        if !was_live {
            *live += 1;
        }
        Ok(())
    }

    /// Marks `key` as deleted in place. A no-op if the key is absent; the
    /// caller relies on the WAL and compaction to propagate the deletion.
    pub fn delete(&self, key: &str) -> Result<(), MemtableError> {
        trace!(%key, "memtable delete");

        let mut table = self
            .inner
            .write()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        let mut live = self
            .live_count
            .write()
            .map_err(|_| MemtableError::Internal("live-count lock poisoned".into()))?;

        if let Some(pair) = table.get_mut(key) {
            if !pair.tombstone {
                pair.tombstone = true;
                pair.value.clear();
                *live = live.saturating_sub(1);
            }
        }
        Ok(())
    }

    /// Unconditionally ensures a tombstone entry exists for `key`, inserting
    /// one even if the key was never written at this level. Used by the
    /// LSM coordinator's `delete`, which must shadow a live value sitting
    /// in an older frozen memtable or sorted block — a no-op-on-absent
    /// `delete` would leave that older value visible.
    pub fn force_tombstone(&self, key: &str) -> Result<(), MemtableError> {
        let mut table = self
            .inner
            .write()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        let mut live = self
            .live_count
            .write()
            .map_err(|_| MemtableError::Internal("live-count lock poisoned".into()))?;

        match table.get_mut(key) {
            Some(pair) if !pair.tombstone => {
                pair.tombstone = true;
                pair.value.clear();
                *live = live.saturating_sub(1);
            }
            Some(_) => {}
            None => {
                table.insert(key.to_string(), Pair::new_tombstone(key));
            }
        }
        Ok(())
    }

    /// Returns the pair for `key`, or `None` if it has never been written
    /// (or has no entry) at this level. The caller must inspect `tombstone`
    /// to distinguish a live value from a deletion recorded at this level.
    pub fn find(&self, key: &str) -> Result<Option<Pair>, MemtableError> {
        let table = self
            .inner
            .read()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        Ok(table.get(key).cloned())
    }

    /// Ordered enumeration of every pair held by this memtable, tombstones
    /// included. Used to build a [`crate::sstable::SortedBlock`] on flush.
    pub fn enumerate(&self) -> Result<Vec<Pair>, MemtableError> {
        let table = self
            .inner
            .read()
            .map_err(|_| MemtableError::Internal("memtable lock poisoned".into()))?;
        Ok(table.values().cloned().collect())
    }

    /// Count of live (non-tombstoned) keys — the flush-trigger input.
    pub fn size(&self) -> usize {
        *self.live_count.read().expect("live-count lock poisoned")
    }

    /// Total number of keys tracked, including tombstoned ones.
    pub fn len(&self) -> usize {
        self.inner.read().expect("memtable lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find() {
        let mt = Memtable::new();
        mt.insert("a", "1").unwrap();
        let p = mt.find("a").unwrap().unwrap();
        assert_eq!(p.value, "1");
        assert!(!p.tombstone);
        assert_eq!(mt.size(), 1);
    }

    #[test]
    fn overwrite_clears_tombstone() {
        let mt = Memtable::new();
        mt.insert("a", "1").unwrap();
        mt.delete("a").unwrap();
        assert_eq!(mt.size(), 0);
        mt.insert("a", "2").unwrap();
        assert_eq!(mt.size(), 1);
        let p = mt.find("a").unwrap().unwrap();
        assert!(!p.tombstone);
        assert_eq!(p.value, "2");
    }

    #[test]
    fn delete_on_absent_key_is_noop() {
        let mt = Memtable::new();
        mt.delete("ghost").unwrap();
        assert_eq!(mt.size(), 0);
        assert!(mt.find("ghost").unwrap().is_none());
    }

    #[test]
    fn delete_present_key_retains_tombstone_entry() {
        let mt = Memtable::new();
        mt.insert("a", "1").unwrap();
        mt.delete("a").unwrap();
        let p = mt.find("a").unwrap().unwrap();
        assert!(p.tombstone);
        assert_eq!(mt.size(), 0);
        assert_eq!(mt.len(), 1);
    }

    #[test]
    fn double_delete_does_not_underflow_size() {
        let mt = Memtable::new();
        mt.insert("a", "1").unwrap();
        mt.delete("a").unwrap();
        mt.delete("a").unwrap();
        assert_eq!(mt.size(), 0);
    }

    #[test]
    fn force_tombstone_creates_entry_for_absent_key() {
        let mt = Memtable::new();
        mt.force_tombstone("ghost").unwrap();
        let p = mt.find("ghost").unwrap().unwrap();
        assert!(p.tombstone);
        assert_eq!(mt.size(), 0);
        assert_eq!(mt.len(), 1);
    }

    #[test]
    fn force_tombstone_on_live_key_decrements_size() {
        let mt = Memtable::new();
        mt.insert("a", "1").unwrap();
        mt.force_tombstone("a").unwrap();
        assert_eq!(mt.size(), 0);
        assert!(mt.find("a").unwrap().unwrap().tombstone);
    }

    #[test]
    fn enumerate_is_ordered() {
        let mt = Memtable::new();
        mt.insert("c", "3").unwrap();
        mt.insert("a", "1").unwrap();
        mt.insert("b", "2").unwrap();
        let keys: Vec<_> = mt.enumerate().unwrap().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}

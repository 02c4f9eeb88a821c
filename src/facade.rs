//! # Engine Façade Module
//!
//! Composes the LSM coordinator (C4), the write-ahead log (C5), and the
//! partitioned snapshot store (C6) into the single `put`/`get`/`delete`
//! surface collaborators (the TCP/UDP front end) call (component C7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::info;

use crate::config::{DbEngineConfig, DiskStoreConfig};
use crate::engine::{EngineConfig, EngineError, LsmCoordinator};
use crate::snapshot::{SnapshotError, SnapshotStore};
use crate::wal::{Wal, WalError};

#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("write-ahead log error: {0}")]
    Wal(#[from] WalError),

    #[error("snapshot store error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// A key or value contained a byte the on-disk formats cannot carry.
    #[error("key or value contains a forbidden '|', ':' or newline byte")]
    ForbiddenByte,
}

fn reject_forbidden_bytes(key: &str, value: Option<&str>) -> Result<(), FacadeError> {
    let has_forbidden = |s: &str| s.contains('|') || s.contains(':') || s.contains('\n');
    if has_forbidden(key) || value.is_some_and(has_forbidden) {
        return Err(FacadeError::ForbiddenByte);
    }
    Ok(())
}

/// The top-level handle collaborators hold: one WAL, one LSM coordinator,
/// one snapshot store, wired together with the recovery sequence and
/// background threads already running.
pub struct EngineFacade {
    wal: Arc<Wal>,
    coordinator: Arc<LsmCoordinator>,
    snapshot_store: Arc<SnapshotStore>,
    shutdown: Arc<AtomicBool>,
    _compaction_thread: JoinHandle<()>,
    _persister_thread: JoinHandle<()>,
}

impl EngineFacade {
    /// Startup sequence: open the WAL, create the coordinator and start its
    /// compactor, create the snapshot store, recover cold state into the
    /// coordinator, then spawn the persister.
    pub fn start(db_engine: &DbEngineConfig, disk_store: &DiskStoreConfig) -> Result<Self, FacadeError> {
        let wal = Arc::new(Wal::open(&db_engine.wal_path)?);

        let coordinator = LsmCoordinator::new(EngineConfig {
            max_elements_before_flush: db_engine.max_elements_before_flush,
            compaction_frequency: std::time::Duration::from_millis(db_engine.compaction_frequency_in_ms),
            bloom_capacity: db_engine.bloom_capacity,
            bloom_error_rate: db_engine.bloom_error_rate,
        });
        let compaction_thread = coordinator.spawn_compactor();

        let snapshot_store = Arc::new(SnapshotStore::open(&disk_store.directory, disk_store.num_of_partitions)?);

        snapshot_store.load_from_disk(coordinator.as_ref(), &wal)?;
        info!("recovery complete");

        let shutdown = Arc::new(AtomicBool::new(false));
        let persister_thread = snapshot_store.spawn_persister(Arc::clone(&wal), Arc::clone(&shutdown));

        Ok(Self {
            wal,
            coordinator,
            snapshot_store,
            shutdown,
            _compaction_thread: compaction_thread,
            _persister_thread: persister_thread,
        })
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), FacadeError> {
        reject_forbidden_bytes(key, Some(value))?;
        self.wal.write_put(key, value)?;
        self.coordinator.put(key, value)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, FacadeError> {
        self.wal.persist()?;
        Ok(self.coordinator.get(key)?)
    }

    pub fn delete(&self, key: &str) -> Result<(), FacadeError> {
        reject_forbidden_bytes(key, None)?;
        self.wal.write_delete(key)?;
        self.coordinator.delete(key)?;
        Ok(())
    }

    /// Flushes the WAL and stops background loops. Idempotent.
    pub fn shutdown(&self) -> Result<(), FacadeError> {
        self.coordinator.request_shutdown();
        self.shutdown.store(true, Ordering::Relaxed);
        self.wal.persist()?;
        info!("facade shutdown complete");
        Ok(())
    }

    /// The underlying write-ahead log. Exposed for tests that need to
    /// drive a persist cycle directly rather than wait out the
    /// background persister's real interval.
    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    /// The underlying snapshot store. Exposed for tests; see [`Self::wal`].
    pub fn snapshot_store(&self) -> &SnapshotStore {
        &self.snapshot_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn facade(dir: &std::path::Path) -> EngineFacade {
        let db_engine = DbEngineConfig {
            wal_path: dir.join("wal.aof"),
            max_elements_before_flush: 1000,
            compaction_frequency_in_ms: 3_600_000,
            bloom_capacity: 1000,
            bloom_error_rate: 0.01,
        };
        let disk_store = DiskStoreConfig {
            num_of_partitions: 4,
            directory: dir.join("data"),
        };
        EngineFacade::start(&db_engine, &disk_store).unwrap()
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let f = facade(dir.path());
        f.put("a", "1").unwrap();
        assert_eq!(f.get("a").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn delete_masks_the_value() {
        let dir = tempdir().unwrap();
        let f = facade(dir.path());
        f.put("a", "1").unwrap();
        f.delete("a").unwrap();
        assert_eq!(f.get("a").unwrap(), None);
    }

    #[test]
    fn forbidden_bytes_are_rejected_before_touching_the_wal() {
        let dir = tempdir().unwrap();
        let f = facade(dir.path());
        assert!(f.put("a|b", "1").is_err());
        assert!(f.put("a", "1:2").is_err());
        assert!(f.put("a", "1\n2").is_err());
    }

    #[test]
    fn recovery_replays_wal_into_a_fresh_coordinator() {
        let dir = tempdir().unwrap();
        {
            let f = facade(dir.path());
            f.put("a", "1").unwrap();
            f.put("b", "2").unwrap();
            f.shutdown().unwrap();
        }
        let f2 = facade(dir.path());
        assert_eq!(f2.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(f2.get("b").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn recovery_from_snapshot_store_after_persister_drains_wal() {
        let dir = tempdir().unwrap();
        {
            let f = facade(dir.path());
            f.put("a", "1").unwrap();
            f.wal.persist().unwrap();
            // Simulate the persister cycle directly rather than sleeping
            // for the real 5s interval.
            f.snapshot_store.write_value("a", "1").unwrap();
            f.wal.truncate().unwrap();
            f.shutdown().unwrap();
        }
        let f2 = facade(dir.path());
        assert_eq!(f2.get("a").unwrap(), Some("1".to_string()));
    }
}

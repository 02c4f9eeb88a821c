//! # Partitioned Snapshot Store Module
//!
//! Hash-partitioned, persistent key→value files used for cold recovery and
//! long-term storage of entries the write-ahead log has already absorbed
//! (component C6).
//!
//! ## Partitioning
//!
//! Partition assignment is `FNV-1a-32(key) mod P`. The algorithm is
//! inlined rather than pulled from a crate: the widely-used `fnv` crate
//! exposes only its 64-bit variant, which does not reduce to the 32-bit
//! FNV-1a this component is specified against (see `DESIGN.md`).
//!
//! ## File format
//!
//! Each partition is a line-delimited `key:value\n` text file. `put`/
//! `delete` reject keys or values containing `:` or `\n` before ever
//! touching a file — the alternative (escaping) is not adopted, matching
//! the "forbid the offending bytes" resolution documented alongside this
//! component's design.
//!
//! ## Lock discipline
//!
//! One `RwLock<()>` per partition. Reading the existing value for a key
//! takes the **shared** side; rewriting a partition file (put or delete)
//! takes the **exclusive** side.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::wal::{Wal, WalEntry, WalError, WalRecoverable};

/// Background persister cadence, matching the reference's cadence.
pub const PERSIST_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("write-ahead log error: {0}")]
    Wal(#[from] WalError),

    #[error("key or value contains a forbidden ':' or newline byte")]
    ForbiddenByte,

    #[error("internal error: {0}")]
    Internal(String),
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn reject_forbidden_bytes(key: &str, value: &str) -> Result<(), SnapshotError> {
    let has_forbidden = |s: &str| s.contains(':') || s.contains('\n');
    if has_forbidden(key) || has_forbidden(value) {
        return Err(SnapshotError::ForbiddenByte);
    }
    Ok(())
}

fn parse_kv_line(line: &str) -> Option<(String, String)> {
    let sep = line.find(':')?;
    Some((line[..sep].to_string(), line[sep + 1..].to_string()))
}

/// A hash-partitioned, file-backed key→value store.
pub struct SnapshotStore {
    directory: PathBuf,
    partitions: Vec<RwLock<()>>,
}

impl SnapshotStore {
    /// Opens (creating if needed) a store with `num_partitions` partition
    /// files under `directory`.
    pub fn open(directory: impl AsRef<Path>, num_partitions: usize) -> Result<Self, SnapshotError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        let num_partitions = num_partitions.max(1);
        info!(path = %directory.display(), num_partitions, "snapshot store opened");
        Ok(Self {
            directory,
            partitions: (0..num_partitions).map(|_| RwLock::new(())).collect(),
        })
    }

    fn partition_index(&self, key: &str) -> usize {
        (fnv1a_32(key.as_bytes()) as usize) % self.partitions.len()
    }

    fn partition_path(&self, index: usize) -> PathBuf {
        self.directory.join(format!("partition_{index}"))
    }

    fn read_partition_lines(path: &Path) -> Result<Vec<(String, String)>, SnapshotError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(contents.lines().filter_map(parse_kv_line).collect()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_partition_lines(path: &Path, lines: &[(String, String)]) -> Result<(), SnapshotError> {
        let mut buf = String::new();
        for (k, v) in lines {
            buf.push_str(k);
            buf.push(':');
            buf.push_str(v);
            buf.push('\n');
        }
        fs::write(path, buf)?;
        Ok(())
    }

    /// Reads the current value for `key`, under the partition's shared lock.
    pub fn read_value(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        let index = self.partition_index(key);
        let _guard = self.partitions[index]
            .read()
            .map_err(|_| SnapshotError::Internal("partition lock poisoned".into()))?;
        let lines = Self::read_partition_lines(&self.partition_path(index))?;
        Ok(lines.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }

    /// Writes `key:value`, replacing any existing line for `key`, under the
    /// partition's exclusive lock.
    pub fn write_value(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        reject_forbidden_bytes(key, value)?;
        let index = self.partition_index(key);
        let path = self.partition_path(index);
        let _guard = self.partitions[index]
            .write()
            .map_err(|_| SnapshotError::Internal("partition lock poisoned".into()))?;
        let mut lines = Self::read_partition_lines(&path)?;
        lines.retain(|(k, _)| k != key);
        lines.push((key.to_string(), value.to_string()));
        Self::write_partition_lines(&path, &lines)
    }

    /// Removes `key`'s line, under the partition's exclusive lock.
    pub fn delete_value(&self, key: &str) -> Result<(), SnapshotError> {
        let index = self.partition_index(key);
        let path = self.partition_path(index);
        let _guard = self.partitions[index]
            .write()
            .map_err(|_| SnapshotError::Internal("partition lock poisoned".into()))?;
        let mut lines = Self::read_partition_lines(&path)?;
        lines.retain(|(k, _)| k != key);
        Self::write_partition_lines(&path, &lines)
    }

    /// Recovery: loads every partition file into `coordinator`, then
    /// replays the WAL on top of it.
    pub fn load_from_disk(&self, coordinator: &impl WalRecoverable, wal: &Wal) -> Result<(), SnapshotError> {
        for index in 0..self.partitions.len() {
            let lines = Self::read_partition_lines(&self.partition_path(index))?;
            for (key, value) in lines {
                coordinator.recover_put(&key, &value);
            }
        }
        wal.init_db(coordinator)?;
        Ok(())
    }

    /// One persister cycle: drains the WAL, fans a worker out per entry,
    /// then truncates the WAL once every worker has returned.
    fn run_persist_cycle(&self, wal: &Wal) -> Result<(), SnapshotError> {
        let entries = wal.read_entries()?;
        if entries.is_empty() {
            return Ok(());
        }

        let outcome = crossbeam::scope(|scope| {
            for entry in &entries {
                scope.spawn(move |_| match entry {
                    WalEntry::Put { key, value } => {
                        if let Err(err) = self.write_value(key, value) {
                            warn!(%err, key, "persister failed to write partition");
                        }
                    }
                    WalEntry::Delete { key } => {
                        if let Err(err) = self.delete_value(key) {
                            warn!(%err, key, "persister failed to delete from partition");
                        }
                    }
                });
            }
        });
        outcome.map_err(|_| SnapshotError::Internal("persister worker panicked".into()))?;

        wal.truncate()?;
        info!(count = entries.len(), "persister drained wal into snapshot store");
        Ok(())
    }

    /// Spawns the long-lived background persister thread.
    pub fn spawn_persister(self: &Arc<Self>, wal: Arc<Wal>, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        std::thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(PERSIST_INTERVAL);
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(err) = store.run_persist_cycle(&wal) {
                    warn!(%err, "persister cycle failed, will retry next tick");
                }
            }
        })
    }
}

//! # Write-Ahead Log Module
//!
//! An append-only, crash-safe operation journal (component C5) that makes
//! acknowledged `put`/`delete` calls durable ahead of their effect on the
//! in-memory engine state.
//!
//! ## On-disk format
//!
//! Newline-terminated text records, each a sequence of `|`-separated
//! fields. Field 0 is the operation tag:
//!
//! ```text
//! +|key|value|\n   -- put
//! -|key|\n         -- delete
//! ```
//!
//! This differs from a binary length-prefixed/CRC-framed log on purpose:
//! the format is the one the on-disk layout is specified against, and it
//! stays human-inspectable. Durability is still enforced structurally —
//! `persist` flushes and `fsync`s before returning, and a record is only
//! ever appended to the in-memory buffer whole, never split across calls.
//!
//! ## Concurrency model
//!
//! A single `Mutex` guards the in-memory append buffer and the open file
//! handle together, so `write`/`persist`/`truncate` observe a consistent
//! view. Multiple writer threads may call `write` concurrently; each call
//! is serialized by the mutex.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, warn};

/// The in-memory append buffer is flushed to disk once it would exceed
/// this many bytes, ahead of accepting a record that would overflow it.
const BUFFER_CAPACITY: usize = 64 * 1024;

/// Errors returned by [`Wal`] operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// One parsed WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalEntry {
    Put { key: String, value: String },
    Delete { key: String },
}

/// Implemented by whatever owns live engine state, so [`Wal::init_db`] can
/// replay entries into it without this module depending on the LSM
/// coordinator directly.
pub trait WalRecoverable {
    fn recover_put(&self, key: &str, value: &str);
    fn recover_delete(&self, key: &str);
}

struct WalState {
    file: File,
    buffer: String,
}

/// The write-ahead log.
pub struct Wal {
    path: PathBuf,
    state: Mutex<WalState>,
}

impl Wal {
    /// Opens the log at `path`, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        info!(path = %path.display(), "wal opened");
        Ok(Self {
            path,
            state: Mutex::new(WalState {
                file,
                buffer: String::new(),
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a `put` record: `+|key|value|\n`.
    pub fn write_put(&self, key: &str, value: &str) -> Result<(), WalError> {
        self.write_record(&format!("+|{key}|{value}|\n"))
    }

    /// Appends a `delete` record: `-|key|\n`.
    pub fn write_delete(&self, key: &str) -> Result<(), WalError> {
        self.write_record(&format!("-|{key}|\n"))
    }

    fn write_record(&self, record: &str) -> Result<(), WalError> {
        let mut state = self.lock();
        if state.buffer.len() + record.len() > BUFFER_CAPACITY {
            flush_locked(&mut state)?;
        }
        state.buffer.push_str(record);
        debug!(bytes = record.len(), "wal record buffered");
        Ok(())
    }

    /// Flushes the in-memory buffer to the file and `fsync`s it. Durability
    /// across a crash is only guaranteed once this returns `Ok`.
    pub fn persist(&self) -> Result<(), WalError> {
        let mut state = self.lock();
        flush_locked(&mut state)
    }

    /// Truncates the log file to zero length — called only after the
    /// partitioned snapshot store has durably absorbed every entry.
    pub fn truncate(&self) -> Result<(), WalError> {
        let mut state = self.lock();
        flush_locked(&mut state)?;
        state.file.set_len(0)?;
        state.file.seek(SeekFrom::Start(0))?;
        info!(path = %self.path.display(), "wal truncated");
        Ok(())
    }

    /// Parses the whole file into an ordered sequence of entries.
    /// Malformed lines are skipped and logged, not treated as fatal.
    pub fn read_entries(&self) -> Result<Vec<WalEntry>, WalError> {
        let mut state = self.lock();
        flush_locked(&mut state)?;
        state.file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        state.file.read_to_string(&mut contents)?;
        state.file.seek(SeekFrom::End(0))?;
        drop(state);

        let mut entries = Vec::new();
        for line in contents.lines() {
            match parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(line, "skipping malformed wal line"),
            }
        }
        Ok(entries)
    }

    /// Replays every parsed entry into `coordinator`.
    pub fn init_db(&self, coordinator: &impl WalRecoverable) -> Result<(), WalError> {
        let entries = self.read_entries()?;
        info!(count = entries.len(), "replaying wal");
        for entry in entries {
            match entry {
                WalEntry::Put { key, value } => coordinator.recover_put(&key, &value),
                WalEntry::Delete { key } => coordinator.recover_delete(&key),
            }
        }
        Ok(())
    }
}

fn flush_locked(state: &mut WalState) -> Result<(), WalError> {
    if state.buffer.is_empty() {
        return Ok(());
    }
    state.file.write_all(state.buffer.as_bytes())?;
    state.file.sync_all()?;
    state.buffer.clear();
    Ok(())
}

/// Parses one line, expecting the exact field count for its tag.
/// Returns `None` on any shape mismatch — the caller logs and skips.
fn parse_line(line: &str) -> Option<WalEntry> {
    let mut fields = line.split('|');
    let tag = fields.next()?;
    match tag {
        "+" => {
            let key = fields.next()?;
            let value = fields.next()?;
            if fields.next().is_some() {
                return None;
            }
            Some(WalEntry::Put {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
        "-" => {
            let key = fields.next()?;
            if fields.next().is_some() {
                return None;
            }
            Some(WalEntry::Delete {
                key: key.to_string(),
            })
        }
        _ => None,
    }
}

//! # Sorted Block Module
//!
//! Implements the immutable, index-accelerated sorted run that backs each
//! frozen memtable once it is flushed, and each compaction output
//! (component C2).
//!
//! ## Design Overview
//!
//! A [`SortedBlock`] holds a sequence of [`Pair`]s strictly increasing by
//! key, serialized into a single in-memory payload buffer as
//! length-prefixed, CRC32-checked records (the engine's ambient integrity
//! discipline — see [`crate::wal`] for the same pattern applied to the log).
//!
//! Unlike a conventional SSTable, this block is never written to a file
//! that survives a restart: the system's durability story is carried
//! entirely by the write-ahead log and the partitioned snapshot store (see
//! `SPEC_FULL.md` §2). A `SortedBlock` is purely an in-process
//! read-acceleration structure, rebuilt from scratch by replaying the WAL
//! and snapshot store on every startup.
//!
//! A *sparse index* samples every [`INDEX_SAMPLING_RATIO`]-th pair and maps
//! its key to the byte offset of the record group it starts. A lookup
//! decodes only the byte range between the floor and ceiling samples
//! bracketing the target key, bounding decode cost to O(log(|index|) + k).
//!
//! ## Sub-modules
//!
//! - [`builder`] — constructs a `SortedBlock` from an ordered `Pair` stream.
//! - [`reader`] — implements `get`/`enumerate`/`delete` against the payload.

pub mod builder;
pub mod reader;


use std::collections::BTreeMap;

use thiserror::Error;

use crate::encoding::EncodingError;

/// Every 10th pair is sampled into the sparse index — a compile-time
/// constant per the design (the reference implementation uses the same
/// ratio).
pub const INDEX_SAMPLING_RATIO: usize = 10;

/// Errors returned by [`SortedBlock`] operations.
#[derive(Debug, Error)]
pub enum SortedBlockError {
    /// A record failed to decode (corrupt payload or framing bug).
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// A record's checksum did not match its payload.
    #[error("checksum mismatch at offset {0}")]
    ChecksumMismatch(usize),
}

/// An immutable, in-memory sorted run of [`Pair`]s with a sparse index.
///
/// See the [module-level documentation](self) for format and recovery
/// model details.
#[derive(Debug, Clone, Default)]
pub struct SortedBlock {
    /// Serialized, length-prefixed, CRC32-checked records.
    pub(crate) payload: Vec<u8>,

    /// Sparse index: sampled key -> byte offset of the group it starts.
    pub(crate) index: BTreeMap<String, u64>,

    /// Number of live records currently encoded in `payload`.
    pub(crate) element_count: usize,
}

impl SortedBlock {
    /// `true` if this block holds no records.
    pub fn empty(&self) -> bool {
        self.element_count == 0
    }

    /// Number of records currently held by this block.
    pub fn len(&self) -> usize {
        self.element_count
    }

    pub fn is_empty(&self) -> bool {
        self.empty()
    }
}

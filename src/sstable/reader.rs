//! Read and in-place-delete operations against a [`SortedBlock`]'s payload.

use std::ops::Bound;

use crc32fast::Hasher as Crc32;

use crate::encoding::{Decode, EncodingError};
use crate::pair::Pair;
use crate::sstable::{SortedBlock, SortedBlockError};

const U32_SIZE: usize = std::mem::size_of::<u32>();

fn checked_slice<'a>(
    payload: &'a [u8],
    start: usize,
    end: usize,
) -> Result<&'a [u8], SortedBlockError> {
    if end > payload.len() || start > end {
        return Err(SortedBlockError::Encoding(EncodingError::UnexpectedEof {
            needed: end.saturating_sub(start),
            available: payload.len().saturating_sub(start.min(payload.len())),
        }));
    }
    Ok(&payload[start..end])
}

/// Decodes one `[u32 len][body][u32 crc32]` record starting at `payload[offset]`.
/// Returns the decoded pair and the offset immediately following the record.
///
/// Every slice bound is checked rather than indexed directly: a corrupt or
/// truncated length field must surface as an error, not a panic.
fn decode_record_at(payload: &[u8], offset: usize) -> Result<(Pair, usize), SortedBlockError> {
    let len_slice = checked_slice(payload, offset, offset + U32_SIZE)?;
    let len_bytes: [u8; U32_SIZE] = len_slice.try_into().expect("length checked above");
    let len = u32::from_le_bytes(len_bytes) as usize;

    let body_start = offset + U32_SIZE;
    let body_end = body_start.saturating_add(len);
    let crc_end = body_end.saturating_add(U32_SIZE);

    let body = checked_slice(payload, body_start, body_end)?;
    let crc_slice = checked_slice(payload, body_end, crc_end)?;
    let stored_crc = u32::from_le_bytes(crc_slice.try_into().expect("length checked above"));

    let mut hasher = Crc32::new();
    hasher.update(&len_bytes);
    hasher.update(body);
    if hasher.finalize() != stored_crc {
        return Err(SortedBlockError::ChecksumMismatch(offset));
    }

    let (pair, consumed) = Pair::decode_from(body)?;
    if consumed != len {
        return Err(SortedBlockError::ChecksumMismatch(offset));
    }
    Ok((pair, crc_end))
}

/// Decodes every record in `payload[start..end]` in order.
fn decode_range(payload: &[u8], start: usize, end: usize) -> Result<Vec<Pair>, SortedBlockError> {
    let mut out = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let (pair, next) = decode_record_at(payload, cursor)?;
        out.push(pair);
        cursor = next;
    }
    Ok(out)
}

impl SortedBlock {
    /// Looks up `key`, decoding only the byte range bracketed by the floor
    /// and ceiling sparse-index samples.
    ///
    /// If no sampled key is `<= key`, there is no floor sample — per the
    /// design note resolving a reference ambiguity, this means "scan from
    /// the start of the payload", not "absent".
    pub fn get(&self, key: &str) -> Result<Option<Pair>, SortedBlockError> {
        if self.empty() {
            return Ok(None);
        }

        let lo_offset = self
            .index
            .range((Bound::Unbounded, Bound::Included(key.to_string())))
            .next_back()
            .map(|(_, off)| *off as usize)
            .unwrap_or(0);

        let hi_offset = self
            .index
            .range((Bound::Excluded(key.to_string()), Bound::Unbounded))
            .next()
            .map(|(_, off)| *off as usize)
            .unwrap_or(self.payload.len());

        for pair in decode_range(&self.payload, lo_offset, hi_offset)? {
            if pair.key == key {
                return Ok(Some(pair));
            }
        }
        Ok(None)
    }

    /// Ordered enumeration of every record in this block, tombstones
    /// included.
    pub fn enumerate(&self) -> Result<Vec<Pair>, SortedBlockError> {
        decode_range(&self.payload, 0, self.payload.len())
    }

    /// Physically removes `key` from this block, rewriting the payload and
    /// sparse index. Returns `true` if a matching record was found and
    /// removed. Non-fatal on internal decode errors — the caller (the LSM
    /// coordinator) treats this as a best-effort eager-reclaim path; the
    /// primary deletion mechanism is tombstone + compaction.
    pub fn delete(&mut self, key: &str) -> Result<bool, SortedBlockError> {
        if self.empty() {
            return Ok(false);
        }

        let all = self.enumerate()?;
        let found = all.iter().any(|p| p.key == key);
        if !found {
            return Ok(false);
        }

        let remaining: Vec<Pair> = all.into_iter().filter(|p| p.key != key).collect();
        let rebuilt = crate::sstable::builder::build(remaining)
            .map_err(SortedBlockError::Encoding)?;
        *self = rebuilt;
        Ok(true)
    }
}

//! Builds a [`SortedBlock`] from an ordered stream of [`Pair`]s.

use crc32fast::Hasher as Crc32;

use crate::encoding::{encode_to_vec, Encode};
use crate::pair::Pair;
use crate::sstable::{SortedBlock, INDEX_SAMPLING_RATIO};

const U32_SIZE: usize = std::mem::size_of::<u32>();

/// Encodes one record as `[u32 len][pair bytes][u32 crc32]`, where the CRC
/// covers `len || pair bytes`. Returns the encoded bytes.
pub(crate) fn encode_record(pair: &Pair) -> Result<Vec<u8>, crate::encoding::EncodingError> {
    let body = encode_to_vec(pair)?;
    let len = body.len() as u32;
    let len_bytes = len.to_le_bytes();

    let mut hasher = Crc32::new();
    hasher.update(&len_bytes);
    hasher.update(&body);
    let crc = hasher.finalize();

    let mut record = Vec::with_capacity(U32_SIZE + body.len() + U32_SIZE);
    record.extend_from_slice(&len_bytes);
    record.extend_from_slice(&body);
    record.extend_from_slice(&crc.to_le_bytes());
    Ok(record)
}

/// Builds a [`SortedBlock`] from `pairs`, which **must** already be sorted
/// strictly ascending by key (the caller — memtable enumeration or
/// compaction's merge — guarantees this).
pub fn build(pairs: Vec<Pair>) -> Result<SortedBlock, crate::encoding::EncodingError> {
    let mut payload = Vec::new();
    let mut index = std::collections::BTreeMap::new();

    for (i, pair) in pairs.iter().enumerate() {
        if i % INDEX_SAMPLING_RATIO == 0 {
            index.insert(pair.key.clone(), payload.len() as u64);
        }
        let record = encode_record(pair)?;
        payload.extend_from_slice(&record);
    }

    Ok(SortedBlock {
        payload,
        index,
        element_count: pairs.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_every_kth_key() {
        let pairs: Vec<Pair> = (0..25)
            .map(|i| Pair::new(format!("k{i:02}"), format!("v{i}")))
            .collect();
        let block = build(pairs).unwrap();
        assert_eq!(block.len(), 25);
        // indices 0, 10, 20 sampled.
        assert_eq!(block.index.len(), 3);
        assert!(block.index.contains_key("k00"));
        assert!(block.index.contains_key("k10"));
        assert!(block.index.contains_key("k20"));
    }

    #[test]
    fn empty_input_yields_empty_block() {
        let block = build(vec![]).unwrap();
        assert!(block.empty());
        assert!(block.payload.is_empty());
    }
}

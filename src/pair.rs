//! The fundamental unit of storage: a key, a value, and a tombstone bit.

use crate::encoding::{Decode, Encode, EncodingError};

/// A single key-value entry, or a tombstone marking that key as deleted.
///
/// `tombstone = true` means "this key is deleted at and above this level";
/// `value` is then semantically undefined (but still present on the wire —
/// see [`Pair::new_tombstone`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: String,
    pub tombstone: bool,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            tombstone: false,
        }
    }

    pub fn new_tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
            tombstone: true,
        }
    }
}

impl Encode for Pair {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.key.encode_to(buf)?;
        self.value.encode_to(buf)?;
        self.tombstone.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for Pair {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (key, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (value, n) = String::decode_from(&buf[off..])?;
        off += n;
        let (tombstone, n) = bool::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                key,
                value,
                tombstone,
            },
            off,
        ))
    }
}

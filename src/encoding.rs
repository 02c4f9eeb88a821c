//! Deterministic, zero-dependency binary encoding for sorted-block payloads.
//!
//! This module provides the [`Encode`] and [`Decode`] traits used to frame
//! records inside a [`crate::sstable::SortedBlock`] payload. The wire format
//! is intentionally tiny: it only needs to cover the handful of primitives a
//! [`crate::pair::Pair`] is built from.
//!
//! # Wire format
//!
//! | Rust type   | Encoding                               |
//! |-------------|-----------------------------------------|
//! | `bool`      | 1 byte (`0x00` = false, `0x01` = true)  |
//! | `u32`       | 4 bytes, little-endian                  |
//! | `u64`       | 8 bytes, little-endian                  |
//! | `String`    | `[u32 len][utf-8 bytes]`                |
//!
//! All multi-byte integers are little-endian. String lengths are `u32`,
//! limiting individual keys/values to 4 GiB.

use thiserror::Error;

/// Errors produced during encoding or decoding.
#[derive(Debug, Error)]
pub enum EncodingError {
    /// The buffer ran out of bytes before decoding completed.
    #[error("unexpected end of buffer (need {needed} bytes, have {available})")]
    UnexpectedEof { needed: usize, available: usize },

    /// A bool field contained a byte other than `0x00` or `0x01`.
    #[error("invalid bool byte: 0x{0:02X} (expected 0x00 or 0x01)")]
    InvalidBool(u8),

    /// A byte-sequence decoded as a string was not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A length exceeded `u32::MAX`.
    #[error("length overflow: {0}")]
    LengthOverflow(String),
}

/// Serialize `self` into a byte buffer.
pub trait Encode {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError>;
}

/// Deserialize a value from a byte slice, returning `(value, bytes_consumed)`.
pub trait Decode: Sized {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError>;
}

#[inline]
fn require(buf: &[u8], needed: usize) -> Result<(), EncodingError> {
    if buf.len() < needed {
        Err(EncodingError::UnexpectedEof {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

#[inline]
fn len_to_u32(len: usize) -> Result<u32, EncodingError> {
    u32::try_from(len)
        .map_err(|_| EncodingError::LengthOverflow(format!("length {len} exceeds u32::MAX")))
}

impl Encode for bool {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.push(if *self { 1 } else { 0 });
        Ok(())
    }
}

impl Decode for bool {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 1)?;
        match buf[0] {
            0 => Ok((false, 1)),
            1 => Ok((true, 1)),
            other => Err(EncodingError::InvalidBool(other)),
        }
    }
}

impl Encode for u32 {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Decode for u32 {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 4)?;
        let bytes: [u8; 4] = buf[..4].try_into().expect("length checked above");
        Ok((u32::from_le_bytes(bytes), 4))
    }
}

impl Encode for u64 {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        buf.extend_from_slice(&self.to_le_bytes());
        Ok(())
    }
}

impl Decode for u64 {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        require(buf, 8)?;
        let bytes: [u8; 8] = buf[..8].try_into().expect("length checked above");
        Ok((u64::from_le_bytes(bytes), 8))
    }
}

impl Encode for String {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        let len = len_to_u32(self.len())?;
        len.encode_to(buf)?;
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl Decode for String {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (len, n) = u32::decode_from(buf)?;
        let len = len as usize;
        require(&buf[n..], len)?;
        let s = String::from_utf8(buf[n..n + len].to_vec())?;
        Ok((s, n + len))
    }
}

/// Encode a value into a freshly-allocated `Vec<u8>`.
pub fn encode_to_vec<T: Encode>(value: &T) -> Result<Vec<u8>, EncodingError> {
    let mut buf = Vec::new();
    value.encode_to(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_primitives() {
        let mut buf = Vec::new();
        true.encode_to(&mut buf).unwrap();
        42u32.encode_to(&mut buf).unwrap();
        7u64.encode_to(&mut buf).unwrap();
        "hello".to_string().encode_to(&mut buf).unwrap();

        let mut off = 0;
        let (b, n) = bool::decode_from(&buf[off..]).unwrap();
        off += n;
        assert!(b);
        let (u, n) = u32::decode_from(&buf[off..]).unwrap();
        off += n;
        assert_eq!(u, 42);
        let (u, n) = u64::decode_from(&buf[off..]).unwrap();
        off += n;
        assert_eq!(u, 7);
        let (s, n) = String::decode_from(&buf[off..]).unwrap();
        off += n;
        assert_eq!(s, "hello");
        assert_eq!(off, buf.len());
    }

    #[test]
    fn truncated_buffer_is_eof() {
        let buf = encode_to_vec(&42u32).unwrap();
        let err = u32::decode_from(&buf[..2]).unwrap_err();
        assert!(matches!(err, EncodingError::UnexpectedEof { .. }));
    }

    #[test]
    fn invalid_bool_byte_rejected() {
        let err = bool::decode_from(&[5]).unwrap_err();
        assert!(matches!(err, EncodingError::InvalidBool(5)));
    }
}

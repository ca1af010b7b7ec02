//! Byte packing of score inputs
//!
//! Layout, in this order: optional prefix, `prev_block`, `tx_commit`,
//! `time_val`, `target` (each 16-bit big-endian), then the nonce (32-bit
//! little-endian). Wider values are truncated to their low bits.

use crate::ScoreInput;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Tag prepended to the RIPEMD160 buffer
pub const RIPEMD160_PREFIX: &[u8] = b"BTC-LARP:";

/// Size of the packed fields without any prefix
pub const FIELDS_LEN: usize = 4 * 2 + 4;

/// Low 16 bits of `n`, big-endian
pub fn pack_be16(n: i64) -> [u8; 2] {
    let mut out = [0u8; 2];
    BigEndian::write_u16(&mut out, n as u16);
    out
}

/// Low 32 bits of `n`, little-endian
pub fn pack_le32(n: i64) -> [u8; 4] {
    let mut out = [0u8; 4];
    LittleEndian::write_u32(&mut out, n as u32);
    out
}

/// Serialized score input, ready to be hashed
#[derive(Clone, PartialEq, Eq)]
pub struct PackedBuffer {
    bytes: Bytes,
}

impl PackedBuffer {
    /// Pack `input` behind `prefix`
    pub fn pack(input: &ScoreInput, prefix: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(prefix.len() + FIELDS_LEN);
        buf.put_slice(prefix);
        buf.put_slice(&pack_be16(input.prev_block));
        buf.put_slice(&pack_be16(input.tx_commit));
        buf.put_slice(&pack_be16(input.time_val));
        buf.put_slice(&pack_be16(input.target));
        buf.put_slice(&pack_le32(input.nonce));

        Self {
            bytes: buf.freeze(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl AsRef<[u8]> for PackedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for PackedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PackedBuffer").field(&self.to_hex()).finish()
    }
}

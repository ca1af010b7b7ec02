//! Hashing and score reduction
//!
//! Both scoring strategies share the field packing and differ only in the
//! buffer prefix, the digest and the reduction from digest to `u32`:
//!
//! - `Ripemd160`: `"BTC-LARP:"` prefix, RIPEMD160, base-255 weighted sum of
//!   the first five digest bytes.
//! - `DoubleSha256`: no prefix, SHA256 of SHA256, first digest word read
//!   big-endian.

use crate::packing::{PackedBuffer, FIELDS_LEN, RIPEMD160_PREFIX};
use crate::{Score, ScoreInput, Verification};
use byteorder::{BigEndian, ByteOrder};
use clap::ValueEnum;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Digest bytes folded into a RIPEMD160 score
const WEIGHTED_BYTES: usize = 5;

/// Per-byte weight multiplier of the RIPEMD160 reduction
const WEIGHT_BASE: u32 = 255;

/// Packing, hashing and reduction algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashStrategy {
    /// Prefixed buffer, RIPEMD160, weighted byte sum
    #[default]
    #[value(alias = "a")]
    #[serde(alias = "a")]
    Ripemd160,
    /// Plain buffer, double SHA256, leading word
    #[value(alias = "b")]
    #[serde(alias = "b")]
    DoubleSha256,
}

impl fmt::Display for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashStrategy::Ripemd160 => write!(f, "ripemd160"),
            HashStrategy::DoubleSha256 => write!(f, "double-sha256"),
        }
    }
}

impl HashStrategy {
    /// Literal bytes hashed ahead of the packed fields
    pub fn prefix(self) -> &'static [u8] {
        match self {
            HashStrategy::Ripemd160 => RIPEMD160_PREFIX,
            HashStrategy::DoubleSha256 => &[],
        }
    }

    /// Length of the packed buffer
    pub fn buffer_len(self) -> usize {
        self.prefix().len() + FIELDS_LEN
    }

    /// Serialize an input the way this strategy hashes it
    pub fn pack(self, input: &ScoreInput) -> PackedBuffer {
        PackedBuffer::pack(input, self.prefix())
    }

    /// Run the strategy's digest over raw bytes
    pub fn digest(self, data: &[u8]) -> BlockDigest {
        match self {
            HashStrategy::Ripemd160 => BlockDigest::Ripemd160(Ripemd160::digest(data).into()),
            HashStrategy::DoubleSha256 => {
                let first = Sha256::digest(data);
                BlockDigest::DoubleSha256(Sha256::digest(first.as_slice()).into())
            }
        }
    }

    /// Pack, hash and reduce
    pub fn score(self, input: &ScoreInput) -> Score {
        let packed = self.pack(input);
        self.digest(packed.as_bytes()).reduce()
    }
}

/// Raw digest, tagged with the strategy that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDigest {
    Ripemd160([u8; 20]),
    DoubleSha256([u8; 32]),
}

impl BlockDigest {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BlockDigest::Ripemd160(bytes) => bytes,
            BlockDigest::DoubleSha256(bytes) => bytes,
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Fold the digest into a score
    pub fn reduce(&self) -> Score {
        match self {
            BlockDigest::Ripemd160(bytes) => Score::new(weighted_sum(bytes)),
            BlockDigest::DoubleSha256(bytes) => Score::new(leading_word(bytes)),
        }
    }
}

/// `sum(byte[i] * 255^i) mod 2^32` over the first five bytes
fn weighted_sum(digest: &[u8]) -> u32 {
    let mut result = 0u32;
    let mut accum = 1u32;

    for &hr in &digest[..WEIGHTED_BYTES] {
        result = result.wrapping_add(accum.wrapping_mul(u32::from(hr)));
        accum = accum.wrapping_mul(WEIGHT_BASE);
    }

    result
}

/// First four bytes as a big-endian word
fn leading_word(digest: &[u8]) -> u32 {
    BigEndian::read_u32(&digest[..4])
}

/// Stateless scorer bound to one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scorer {
    strategy: HashStrategy,
}

impl Scorer {
    pub fn new(strategy: HashStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> HashStrategy {
        self.strategy
    }

    /// Score an input
    pub fn score(&self, input: &ScoreInput) -> Score {
        self.strategy.score(input)
    }

    /// Score an input and check it against its own target
    pub fn score_and_check(&self, input: &ScoreInput) -> (bool, Score) {
        let score = self.score(input);
        (score.meets_target(input.target), score)
    }

    /// Score a single nonce for display
    pub fn verify(&self, input: &ScoreInput) -> Verification {
        Verification {
            input: *input,
            score: self.score(input),
        }
    }
}

/// Block score of the five parameters under `strategy`
///
/// Total over all integers: the first four parameters contribute their low
/// 16 bits and the nonce its low 32 bits.
pub fn score(
    prev_block: i64,
    tx_commit: i64,
    target: i64,
    time_val: i64,
    nonce: i64,
    strategy: HashStrategy,
) -> u32 {
    let input = ScoreInput::new(prev_block, tx_commit, target, time_val, nonce);
    strategy.score(&input).value()
}

//! Core types for block scoring
//!
//! Plain value types: the five score parameters, the resulting score and the
//! description of a mining run. Nothing here is mutated after construction.

use crate::crypto::HashStrategy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default upper bound for the nonce search
pub const DEFAULT_MAX_TRIES: i64 = 999_999;

/// The five parameters fed into the scorer
///
/// Fields hold any integer. Packing keeps only the low 16 bits of the first
/// four fields and the low 32 bits of the nonce, so out-of-range or negative
/// values are truncated rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScoreInput {
    /// Previous block id
    pub prev_block: i64,
    /// Transaction commitment id
    pub tx_commit: i64,
    /// Target threshold (also packed into the hashed buffer)
    pub target: i64,
    /// Time value
    pub time_val: i64,
    /// Nonce
    pub nonce: i64,
}

impl ScoreInput {
    /// Create a new score input
    pub fn new(prev_block: i64, tx_commit: i64, target: i64, time_val: i64, nonce: i64) -> Self {
        Self {
            prev_block,
            tx_commit,
            target,
            time_val,
            nonce,
        }
    }

    /// Same parameters with a different nonce
    pub fn with_nonce(self, nonce: i64) -> Self {
        Self { nonce, ..self }
    }

    /// Reject negative parameters
    ///
    /// Optional stricter contract. Scoring never calls this and in-range
    /// values pack identically either way.
    pub fn validate_strict(&self) -> Result<()> {
        let fields = [
            ("prev_block", self.prev_block),
            ("tx_commit", self.tx_commit),
            ("target", self.target),
            ("time_val", self.time_val),
            ("nonce", self.nonce),
        ];

        for (name, value) in fields {
            if value < 0 {
                return Err(Error::invalid_input(format!(
                    "{} must not be negative, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for ScoreInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prev={}, tx={}, time={}, target={}, nonce={}",
            self.prev_block, self.tx_commit, self.time_val, self.target, self.nonce
        )
    }
}

/// Block score, the comparable "block hash" of a score input
///
/// Displays zero-padded to at least six digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(pub u32);

impl Score {
    /// Create a new score
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Success predicate of a verification or mining attempt: `score <= target`
    pub fn meets_target(self, target: i64) -> bool {
        i64::from(self.0) <= target
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// Lowest score seen so far and the nonce that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestSoFar {
    pub score: Score,
    pub nonce: i64,
}

impl BestSoFar {
    /// Keep whichever of the two is better: lower score, then lower nonce
    pub fn merge(self, other: BestSoFar) -> BestSoFar {
        if (other.score, other.nonce) < (self.score, self.nonce) {
            other
        } else {
            self
        }
    }
}

/// Result of scoring a single nonce against its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub input: ScoreInput,
    pub score: Score,
}

impl Verification {
    /// Whether the score is at or below the target
    pub fn is_success(&self) -> bool {
        self.score.meets_target(self.input.target)
    }
}

/// One mining run: the fixed parameters plus the nonce window to search
///
/// The nonce is incremented before every attempt, so the first nonce scored
/// is `start_nonce + 1`. The run ends once the next nonce would reach
/// `max_tries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningJob {
    /// Parameters; the nonce field is replaced on every attempt
    pub input: ScoreInput,
    pub strategy: HashStrategy,
    pub start_nonce: i64,
    pub max_tries: i64,
}

impl MiningJob {
    /// Create a job starting from the input's own nonce
    pub fn new(input: ScoreInput, strategy: HashStrategy) -> Self {
        Self {
            input,
            strategy,
            start_nonce: input.nonce,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }

    /// Override the nonce ceiling
    pub fn with_max_tries(mut self, max_tries: i64) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Target the scores are compared against
    pub fn target(&self) -> i64 {
        self.input.target
    }

    /// Number of nonces the run may try at most
    pub fn search_space(&self) -> u64 {
        let first = i128::from(self.start_nonce) + 1;
        let end = i128::from(self.max_tries);
        u64::try_from((end - first).max(0)).unwrap_or(u64::MAX)
    }
}

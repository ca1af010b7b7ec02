//! Explicit, resumable state of one mining run
//!
//! A session walks the nonces of a [`MiningJob`] in fixed steps, keeping the
//! attempt count and the lowest score seen. Callers drive it batch by batch,
//! so the same state works for a blocking loop, a cooperative task or one
//! stripe of a multi-threaded search.

use super::MiningStats;
use crate::{BestSoFar, MiningJob, Score, Scorer};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How a mining run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum MiningOutcome {
    /// A nonce scored at or below the target
    Found { nonce: i64, score: Score, tries: u64 },
    /// The nonce ceiling was reached without a winner
    Exhausted { best: Option<BestSoFar>, tries: u64 },
    /// Stopped from outside before a winner was found
    Cancelled { best: Option<BestSoFar>, tries: u64 },
}

impl MiningOutcome {
    pub fn tries(&self) -> u64 {
        match self {
            MiningOutcome::Found { tries, .. }
            | MiningOutcome::Exhausted { tries, .. }
            | MiningOutcome::Cancelled { tries, .. } => *tries,
        }
    }

    /// Winning nonce and score, if any
    pub fn winner(&self) -> Option<(i64, Score)> {
        match self {
            MiningOutcome::Found { nonce, score, .. } => Some((*nonce, *score)),
            _ => None,
        }
    }
}

/// A single scored nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attempt {
    nonce: i64,
    score: Score,
}

/// Mining state: next nonce, attempt count, best score and final outcome
#[derive(Debug, Clone)]
pub struct MiningSession {
    job: MiningJob,
    scorer: Scorer,
    next_nonce: Option<i64>,
    stride: i64,
    tries: u64,
    best: Option<BestSoFar>,
    improvements: Vec<BestSoFar>,
    outcome: Option<MiningOutcome>,
}

impl MiningSession {
    /// Session over every nonce of the job
    pub fn new(job: MiningJob) -> Self {
        Self::striped(job, 0, 1)
    }

    /// Session over every `stride`-th nonce, starting `offset` past the first
    ///
    /// Stripes `0..stride` with the same stride partition the job's nonces.
    pub fn striped(job: MiningJob, offset: usize, stride: usize) -> Self {
        let stride = i64::try_from(stride.max(1)).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let next_nonce = job
            .start_nonce
            .checked_add(1)
            .and_then(|first| first.checked_add(offset));

        Self {
            job,
            scorer: Scorer::new(job.strategy),
            next_nonce,
            stride,
            tries: 0,
            best: None,
            improvements: Vec::new(),
            outcome: None,
        }
    }

    pub fn job(&self) -> &MiningJob {
        &self.job
    }

    /// Number of nonces scored so far
    pub fn tries(&self) -> u64 {
        self.tries
    }

    /// Lowest score seen so far
    pub fn best(&self) -> Option<BestSoFar> {
        self.best
    }

    /// Nonce the next attempt would score, if the window is not exhausted
    pub fn next_nonce(&self) -> Option<i64> {
        self.next_nonce.filter(|nonce| *nonce < self.job.max_tries)
    }

    /// Drain every strict improvement of the best score since the last call,
    /// oldest first
    pub fn take_improvements(&mut self) -> Vec<BestSoFar> {
        std::mem::take(&mut self.improvements)
    }

    pub fn outcome(&self) -> Option<MiningOutcome> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Score the next nonce, or `None` once the window is exhausted
    fn next_attempt(&mut self) -> Option<Attempt> {
        let nonce = self.next_nonce()?;
        self.next_nonce = nonce.checked_add(self.stride);

        let score = self.scorer.score(&self.job.input.with_nonce(nonce));
        self.tries += 1;

        if self.best.map_or(true, |best| score < best.score) {
            trace!(nonce, score = score.value(), "new best score");
            let best = BestSoFar { score, nonce };
            self.best = Some(best);
            self.improvements.push(best);
        }

        Some(Attempt { nonce, score })
    }

    fn finish(&mut self, outcome: MiningOutcome) -> MiningOutcome {
        self.outcome = Some(outcome);
        outcome
    }

    /// Try up to `batch` nonces
    ///
    /// Returns the outcome once the run has ended. A finished session keeps
    /// returning the same outcome.
    pub fn step(&mut self, batch: usize) -> Option<MiningOutcome> {
        if let Some(outcome) = self.outcome {
            return Some(outcome);
        }

        for _ in 0..batch.max(1) {
            match self.next_attempt() {
                Some(attempt) if attempt.score.meets_target(self.job.target()) => {
                    return Some(self.finish(MiningOutcome::Found {
                        nonce: attempt.nonce,
                        score: attempt.score,
                        tries: self.tries,
                    }));
                }
                Some(_) => {}
                None => {
                    return Some(self.finish(MiningOutcome::Exhausted {
                        best: self.best,
                        tries: self.tries,
                    }));
                }
            }
        }

        None
    }

    /// Stop the run, keeping the best score so far
    ///
    /// Has no effect on a session that already ended.
    pub fn cancel(&mut self) -> MiningOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        self.finish(MiningOutcome::Cancelled {
            best: self.best,
            tries: self.tries,
        })
    }

    /// Blocking loop: step in batches until done, checking for cancellation
    /// between batches
    pub fn run(&mut self, batch: usize, cancellation: &CancellationToken) -> MiningOutcome {
        loop {
            if cancellation.is_cancelled() {
                return self.cancel();
            }
            if let Some(outcome) = self.step(batch) {
                return outcome;
            }
        }
    }

    /// Snapshot for status reporting
    pub fn stats(&self, elapsed: Duration) -> MiningStats {
        MiningStats::new(self.tries, self.best, elapsed)
    }
}

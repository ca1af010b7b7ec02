//! CPU mining worker implementation
//!
//! Splits the nonce window into interleaved stripes, one per blocking thread.
//! Threads share the lowest winning nonce found so far and stop once their
//! next nonce is past it, so the reported winner is the same one a
//! sequential search would find.

use super::{mining_span, MiningOutcome, MiningSession, MiningStats, MiningWorker};
use crate::{BestSoFar, Error, MiningJob, Result};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

/// Nonces each thread scores between cancellation checks
pub const DEFAULT_CPU_BATCH_SIZE: usize = 1_000;

/// CPU mining worker using multiple threads
pub struct CpuWorker {
    thread_count: usize,
    batch_size: usize,
    status_interval: Duration,
}

/// Progress shared by the mining threads
#[derive(Debug)]
struct CpuMiningStats {
    tries: AtomicU64,
    best: Mutex<Option<BestSoFar>>,
    start_time: Instant,
}

impl CpuMiningStats {
    fn new() -> Self {
        Self {
            tries: AtomicU64::new(0),
            best: Mutex::new(None),
            start_time: Instant::now(),
        }
    }

    /// Merge a thread's best; true if it improved the shared best
    fn merge_best(&self, candidate: BestSoFar) -> bool {
        let mut best = self.best.lock();
        match *best {
            Some(current) if current.merge(candidate) == current => false,
            _ => {
                *best = Some(candidate);
                true
            }
        }
    }

    fn to_mining_stats(&self) -> MiningStats {
        MiningStats::new(
            self.tries.load(Ordering::Relaxed),
            *self.best.lock(),
            self.start_time.elapsed(),
        )
    }
}

impl CpuWorker {
    /// Create a new CPU worker; a thread count of 0 uses every core
    pub fn new(thread_count: usize, batch_size: usize, status_interval: Duration) -> Self {
        let thread_count = if thread_count == 0 {
            num_cpus::get()
        } else {
            thread_count
        };

        info!("Creating CPU worker with {} threads", thread_count);

        Self {
            thread_count,
            batch_size: batch_size.max(1),
            status_interval,
        }
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Search one stripe of the nonce window
    fn mine_stripe(
        thread_id: usize,
        thread_count: usize,
        job: MiningJob,
        batch_size: usize,
        winner: &AtomicI64,
        stats: &CpuMiningStats,
        cancellation: &CancellationToken,
    ) -> MiningOutcome {
        debug!("Starting mining thread {}", thread_id);

        let mut session = MiningSession::striped(job, thread_id, thread_count);
        let mut reported_tries = 0;

        let outcome = loop {
            if cancellation.is_cancelled() {
                break session.cancel();
            }

            // Another thread already won with a lower nonce
            if let Some(next) = session.next_nonce() {
                if next >= winner.load(Ordering::Acquire) {
                    break session.cancel();
                }
            }

            let outcome = session.step(batch_size);

            stats
                .tries
                .fetch_add(session.tries() - reported_tries, Ordering::Relaxed);
            reported_tries = session.tries();

            for best in session.take_improvements() {
                if stats.merge_best(best) {
                    info!("New best hash: {} (Nonce: {})", best.score, best.nonce);
                }
            }

            if let Some(outcome) = outcome {
                if let MiningOutcome::Found { nonce, .. } = outcome {
                    debug!("Thread {} found winning nonce {}", thread_id, nonce);
                    winner.fetch_min(nonce, Ordering::AcqRel);
                }
                break outcome;
            }
        };

        debug!("Thread {} completed with {} tries", thread_id, session.tries());
        outcome
    }

    /// Combine per-thread outcomes into the outcome of the whole run
    fn merge_outcomes(outcomes: &[MiningOutcome], cancelled: bool) -> MiningOutcome {
        let tries = outcomes.iter().map(MiningOutcome::tries).sum();

        let winner = outcomes
            .iter()
            .filter_map(MiningOutcome::winner)
            .min_by_key(|(nonce, _)| *nonce);

        if let Some((nonce, score)) = winner {
            return MiningOutcome::Found { nonce, score, tries };
        }

        let best = outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                MiningOutcome::Exhausted { best, .. } | MiningOutcome::Cancelled { best, .. } => {
                    *best
                }
                MiningOutcome::Found { .. } => None,
            })
            .reduce(BestSoFar::merge);

        if cancelled {
            MiningOutcome::Cancelled { best, tries }
        } else {
            MiningOutcome::Exhausted { best, tries }
        }
    }

    async fn run(
        &self,
        job: MiningJob,
        cancellation: CancellationToken,
        stats_tx: Option<mpsc::UnboundedSender<MiningStats>>,
    ) -> Result<MiningOutcome> {
        info!(
            "Starting CPU mining with {} threads over {} nonces",
            self.thread_count,
            job.search_space()
        );

        let stats = Arc::new(CpuMiningStats::new());
        let winner = Arc::new(AtomicI64::new(i64::MAX));

        let mut handles = Vec::with_capacity(self.thread_count);
        for thread_id in 0..self.thread_count {
            let stats = Arc::clone(&stats);
            let winner = Arc::clone(&winner);
            let cancellation = cancellation.clone();
            let thread_count = self.thread_count;
            let batch_size = self.batch_size;

            handles.push(task::spawn_blocking(move || {
                Self::mine_stripe(
                    thread_id,
                    thread_count,
                    job,
                    batch_size,
                    &winner,
                    &stats,
                    &cancellation,
                )
            }));
        }

        // Statistics reporting loop
        let done = CancellationToken::new();
        let stats_handle = stats_tx.clone().map(|stats_tx| {
            let stats = Arc::clone(&stats);
            let done = done.clone();
            let period = self.status_interval.max(Duration::from_millis(1));
            task::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let _ = stats_tx.send(stats.to_mining_stats());
                        }
                        _ = done.cancelled() => break,
                    }
                }
            })
        });

        let mut outcomes = Vec::with_capacity(handles.len());
        for joined in join_all(handles).await {
            outcomes.push(joined.map_err(|e| Error::worker("cpu", e.to_string()))?);
        }

        done.cancel();
        if let Some(handle) = stats_handle {
            let _ = handle.await;
        }

        let outcome = Self::merge_outcomes(&outcomes, cancellation.is_cancelled());

        if let Some(tx) = &stats_tx {
            let _ = tx.send(stats.to_mining_stats());
        }

        Ok(outcome)
    }
}

#[async_trait]
impl MiningWorker for CpuWorker {
    fn worker_type(&self) -> &'static str {
        "cpu"
    }

    async fn mine(
        &mut self,
        job: MiningJob,
        cancellation: CancellationToken,
        stats_tx: Option<mpsc::UnboundedSender<MiningStats>>,
    ) -> Result<MiningOutcome> {
        let span = mining_span(self.worker_type(), job.strategy, job.target());
        let outcome = self
            .run(job, cancellation, stats_tx)
            .instrument(span)
            .await?;

        info!("CPU mining completed after {} tries", outcome.tries());
        Ok(outcome)
    }
}

//! Cooperative batch worker
//!
//! Scores a small batch of nonces, then yields to the runtime before the
//! next one. Runs on the calling task, so it never needs a thread of its own.

use super::{
    mining_span, MiningOutcome, MiningSession, MiningStats, MiningWorker, DEFAULT_STATUS_INTERVAL,
};
use crate::{MiningJob, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

/// Default nonces per batch
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Single-task mining worker that yields between batches
pub struct BatchWorker {
    batch_size: usize,
    status_interval: Duration,
}

impl BatchWorker {
    /// Create a new batch worker
    pub fn new(batch_size: usize, status_interval: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            status_interval,
        }
    }

    async fn run(
        &self,
        job: MiningJob,
        cancellation: CancellationToken,
        stats_tx: Option<mpsc::UnboundedSender<MiningStats>>,
    ) -> MiningOutcome {
        debug!(
            "Mining nonces {}..{} in batches of {}",
            job.start_nonce.saturating_add(1),
            job.max_tries,
            self.batch_size
        );

        let mut session = MiningSession::new(job);
        let start = Instant::now();
        let mut last_status = start;

        let outcome = loop {
            if cancellation.is_cancelled() {
                break session.cancel();
            }

            let outcome = session.step(self.batch_size);

            for best in session.take_improvements() {
                info!("New best hash: {} (Nonce: {})", best.score, best.nonce);
            }

            if let Some(outcome) = outcome {
                break outcome;
            }

            if last_status.elapsed() >= self.status_interval {
                if let Some(tx) = &stats_tx {
                    let _ = tx.send(session.stats(start.elapsed()));
                }
                last_status = Instant::now();
            }

            tokio::task::yield_now().await;
        };

        if let Some(tx) = &stats_tx {
            let _ = tx.send(session.stats(start.elapsed()));
        }

        outcome
    }
}

impl Default for BatchWorker {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_STATUS_INTERVAL)
    }
}

#[async_trait]
impl MiningWorker for BatchWorker {
    fn worker_type(&self) -> &'static str {
        "batch"
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
            .await;

        debug!("Batch mining ended after {} tries", outcome.tries());
        Ok(outcome)
    }
}

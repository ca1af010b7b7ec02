//! Mining worker implementations
//!
//! A worker drives [`MiningSession`]s until a nonce meets the target, the
//! nonce ceiling is reached, or the cancellation token fires. Two workers are
//! provided: a cooperative single-task loop and a multi-threaded CPU search.

use crate::config::WorkerType;
use crate::utils::{compute_hash_rate, format_hash_rate};
use crate::{BestSoFar, HashStrategy, MiningJob, Result, Score};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

pub mod batch;
pub mod cpu;
pub mod session;

pub use batch::BatchWorker;
pub use cpu::CpuWorker;
pub use session::{MiningOutcome, MiningSession};

/// Default period between status reports
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Progress snapshot of a mining run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiningStats {
    /// Nonces scored so far
    pub tries: u64,
    /// Lowest score so far
    pub best_score: Option<Score>,
    /// Nonce of the lowest score
    pub best_nonce: Option<i64>,
    /// Time spent mining
    pub elapsed: Duration,
    /// Average hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    pub fn new(tries: u64, best: Option<BestSoFar>, elapsed: Duration) -> Self {
        Self {
            tries,
            best_score: best.map(|b| b.score),
            best_nonce: best.map(|b| b.nonce),
            elapsed,
            hash_rate: compute_hash_rate(tries, elapsed),
        }
    }
}

impl fmt::Display for MiningStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tries: {} | Lowest Hash: ", self.tries)?;
        match self.best_score {
            Some(score) => write!(f, "{}", score)?,
            None => f.write_str("-")?,
        }
        f.write_str(" | Best Nonce: ")?;
        match self.best_nonce {
            Some(nonce) => write!(f, "{}", nonce)?,
            None => f.write_str("-")?,
        }
        write!(f, " | {}", format_hash_rate(self.hash_rate))
    }
}

/// Mining worker trait
///
/// Workers must stop promptly when `cancellation` fires and report the best
/// score seen through [`MiningOutcome::Cancelled`].
#[async_trait]
pub trait MiningWorker: Send + Sync {
    /// Get the worker type name for logging
    fn worker_type(&self) -> &'static str;

    /// Search the job's nonce window
    async fn mine(
        &mut self,
        job: MiningJob,
        cancellation: CancellationToken,
        stats_tx: Option<mpsc::UnboundedSender<MiningStats>>,
    ) -> Result<MiningOutcome>;
}

/// Worker factory for creating different types of mining workers
pub struct WorkerFactory;

impl WorkerFactory {
    /// Create a cooperative batch worker
    pub fn create_batch_worker(batch_size: usize, status_interval: Duration) -> Box<dyn MiningWorker> {
        Box::new(BatchWorker::new(batch_size, status_interval))
    }

    /// Create a CPU mining worker
    pub fn create_cpu_worker(
        thread_count: usize,
        batch_size: usize,
        status_interval: Duration,
    ) -> Box<dyn MiningWorker> {
        Box::new(CpuWorker::new(thread_count, batch_size, status_interval))
    }

    /// Batch size for `worker_type`, falling back to the worker's own default
    pub fn batch_size(worker_type: WorkerType, configured: Option<usize>) -> usize {
        configured.unwrap_or(match worker_type {
            WorkerType::Batch => batch::DEFAULT_BATCH_SIZE,
            WorkerType::Cpu => cpu::DEFAULT_CPU_BATCH_SIZE,
        })
    }

    /// Create the worker selected by `worker_type`
    pub fn create(
        worker_type: WorkerType,
        thread_count: usize,
        batch_size: Option<usize>,
        status_interval: Duration,
    ) -> Box<dyn MiningWorker> {
        let batch_size = Self::batch_size(worker_type, batch_size);
        match worker_type {
            WorkerType::Batch => Self::create_batch_worker(batch_size, status_interval),
            WorkerType::Cpu => Self::create_cpu_worker(thread_count, batch_size, status_interval),
        }
    }
}

/// Create a tracing span for mining operations
pub fn mining_span(worker_type: &str, strategy: HashStrategy, target: i64) -> Span {
    tracing::info_span!(
        "mining",
        worker_type = worker_type,
        strategy = %strategy,
        target = target,
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mining_stats() {
        let best = BestSoFar {
            score: Score::new(1234),
            nonce: 77,
        };
        let stats = MiningStats::new(1000, Some(best), Duration::from_secs(10));

        assert_eq!(stats.tries, 1000);
        assert_eq!(stats.best_score, Some(Score::new(1234)));
        assert_eq!(stats.best_nonce, Some(77));
        assert_eq!(stats.hash_rate, 100.0);

        let empty = MiningStats::new(0, None, Duration::ZERO);
        assert_eq!(empty.best_score, None);
        assert_eq!(empty.hash_rate, 0.0);
    }

    #[test]
    fn test_mining_stats_display() {
        let best = BestSoFar {
            score: Score::new(42),
            nonce: 7,
        };
        let stats = MiningStats::new(1_500, Some(best), Duration::from_secs(1));
        assert_eq!(
            stats.to_string(),
            "Tries: 1500 | Lowest Hash: 000042 | Best Nonce: 7 | 1.50 KH/s"
        );

        let empty = MiningStats::new(0, None, Duration::ZERO);
        assert_eq!(
            empty.to_string(),
            "Tries: 0 | Lowest Hash: - | Best Nonce: - | 0.00 H/s"
        );
    }

    #[test]
    fn test_worker_factory() {
        let interval = Duration::from_millis(10);
        assert_eq!(WorkerFactory::create(WorkerType::Batch, 1, None, interval).worker_type(), "batch");
        assert_eq!(WorkerFactory::create(WorkerType::Cpu, 2, Some(3), interval).worker_type(), "cpu");
    }

    #[test]
    fn test_batch_size_defaults_per_worker() {
        assert_eq!(WorkerFactory::batch_size(WorkerType::Batch, None), 3);
        assert_eq!(WorkerFactory::batch_size(WorkerType::Cpu, None), cpu::DEFAULT_CPU_BATCH_SIZE);
        assert_eq!(WorkerFactory::batch_size(WorkerType::Cpu, None), 1_000);
        assert_eq!(WorkerFactory::batch_size(WorkerType::Cpu, Some(7)), 7);
    }
}

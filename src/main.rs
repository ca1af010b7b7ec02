//! LARP Miner - Main Application
//!
//! Verifies a single nonce or mines for one whose block score meets the target.

use larp_miner::{
    config::{Action, Config, LogFormat},
    utils::format_elapsed,
    worker::{MiningOutcome, MiningStats, WorkerFactory},
    Result, Scorer, APP_DESCRIPTION, APP_NAME, APP_VERSION,
};

use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SEPARATOR: &str = "--------------------------------";

#[tokio::main]
async fn main() -> Result<()> {
    // Load and validate configuration
    let config = Config::load().await?;

    init_tracing(&config);

    // Handle special commands
    if config.info {
        print_info();
        return Ok(());
    }

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    let result = match config.action {
        Action::Verify => run_verify(&config),
        Action::Mine => run_mine(&config).await,
    };

    if let Err(e) = &result {
        error!("Error ({}): {}", e.category(), e);
    }
    result
}

/// Initialize tracing; `RUST_LOG` overrides the configured level
fn init_tracing(config: &Config) {
    let level = tracing::Level::from(config.log_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(false))
            .with(filter)
            .init(),
        LogFormat::Plain => tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init(),
    }
}

/// Score the configured nonce once
fn run_verify(config: &Config) -> Result<()> {
    info!("Starting verification...");
    let input = config.verify_input()?;

    info!(
        "Parameters: prev={}, tx={}, time={}, target={}",
        input.prev_block, input.tx_commit, input.time_val, input.target
    );
    info!("Verifying with Nonce: {} ({})", input.nonce, config.strategy);

    let verification = Scorer::new(config.strategy).verify(&input);
    let block_hash = verification.score;

    info!("{}", SEPARATOR);
    info!("Calculated Blockhash: {}", block_hash);

    if verification.is_success() {
        info!(
            "SUCCESS! Blockhash ({}) is less than or equal to Target ({}).",
            block_hash, input.target
        );
    } else {
        warn!(
            "FAILURE! Blockhash ({}) is greater than Target ({}).",
            block_hash, input.target
        );
    }

    Ok(())
}

/// Search for a winning nonce until found, exhausted or interrupted
async fn run_mine(config: &Config) -> Result<()> {
    info!("Starting mining process...");
    let job = config.mining_job()?;

    info!("Target to beat: {}", job.target());
    if config.nonce.is_some() {
        info!("Starting from nonce: {}", job.start_nonce);
    }
    info!(
        "Strategy: {}, worker: {}, max tries: {}",
        job.strategy, config.worker, job.max_tries
    );
    info!("{}", SEPARATOR);

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            ctrl_c.cancel();
        }
    });

    let (stats_tx, mut stats_rx) = mpsc::unbounded_channel::<MiningStats>();
    let stats_handle = tokio::spawn(async move {
        while let Some(stats) = stats_rx.recv().await {
            info!("{}", stats);
        }
    });

    let mut worker = WorkerFactory::create(
        config.worker,
        config.thread_count,
        config.batch_size,
        config.status_interval(),
    );

    let started = Instant::now();
    let outcome = worker.mine(job, cancellation.clone(), Some(stats_tx)).await;
    let elapsed = started.elapsed();

    // Every stats sender is gone once `mine` returns
    let _ = stats_handle.await;

    let outcome = outcome?;
    report_outcome(&outcome, job.max_tries);
    info!("Mining process stopped. Time: {}", format_elapsed(elapsed));

    Ok(())
}

fn report_outcome(outcome: &MiningOutcome, max_tries: i64) {
    match outcome {
        MiningOutcome::Found { nonce, score, tries } => {
            info!("{}", SEPARATOR);
            info!("SUCCESS! Found a valid nonce after {} tries.", tries);
            info!("Winning Nonce: {}", nonce);
            info!("Blockhash: {}", score);
        }
        MiningOutcome::Exhausted { best, tries } => {
            warn!("Stopped: Reached max tries ({}) after {} attempts.", max_tries, tries);
            if let Some(best) = best {
                info!("Lowest Hash: {} (Nonce: {})", best.score, best.nonce);
            }
        }
        MiningOutcome::Cancelled { best, tries } => {
            warn!("Mining cancelled after {} tries.", tries);
            if let Some(best) = best {
                info!("Lowest Hash: {} (Nonce: {})", best.score, best.nonce);
            }
        }
    }
}

/// Print basic program information
fn print_info() {
    println!("{} v{}", APP_NAME, APP_VERSION);
    println!("{}", APP_DESCRIPTION);
}

/// Print current configuration
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(config)?;
    println!("{}", config_yaml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use larp_miner::{BestSoFar, Error, Score};

    #[test]
    fn test_info_functions() {
        // These should not panic
        print_info();
        report_outcome(
            &MiningOutcome::Exhausted {
                best: Some(BestSoFar { score: Score::new(5), nonce: 3 }),
                tries: 10,
            },
            11,
        );
    }

    #[tokio::test]
    async fn test_config_printing() {
        let config = Config::load_from(["larp-miner", "mine", "--worker", "cpu", "-c", "2"])
            .await
            .unwrap();

        assert!(print_configuration(&config).is_ok());
    }

    #[tokio::test]
    async fn test_verify_requires_nonce() {
        let config = Config::load_from(["larp-miner", "-p", "1", "-x", "2", "-m", "3", "-t", "4"])
            .await
            .unwrap();

        assert!(matches!(run_verify(&config), Err(Error::InvalidInput { .. })));
    }
}

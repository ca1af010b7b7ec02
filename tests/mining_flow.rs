//! End-to-end mining runs through the public worker API

use assert_matches::assert_matches;
use larp_miner::worker::{BatchWorker, CpuWorker, MiningOutcome, MiningWorker, WorkerFactory};
use larp_miner::{BestSoFar, Config, HashStrategy, MiningJob, Score, ScoreInput};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn job(target: i64, strategy: HashStrategy) -> MiningJob {
    MiningJob::new(ScoreInput::new(1, 2, target, 3, 0), strategy)
}

#[tokio::test]
async fn batch_worker_finds_first_winner() {
    let mut worker = BatchWorker::default();

    let outcome = worker
        .mine(job(10_000_000, HashStrategy::Ripemd160), CancellationToken::new(), None)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        MiningOutcome::Found {
            nonce: 852,
            score: Score::new(1_317_682),
            tries: 852,
        }
    );
}

#[tokio::test]
async fn cpu_worker_agrees_with_sequential_search() {
    let cases = [
        (HashStrategy::Ripemd160, 50_000_000, 79, 19_747_698),
        (HashStrategy::DoubleSha256, 10_000_000, 381, 1_574_647),
        (HashStrategy::DoubleSha256, 50_000_000, 2, 48_619_355),
    ];

    for (strategy, target, nonce, score) in cases {
        let mut worker = CpuWorker::new(3, 16, Duration::from_millis(10));
        let outcome = worker
            .mine(job(target, strategy), CancellationToken::new(), None)
            .await
            .unwrap();

        assert_eq!(outcome.winner(), Some((nonce, Score::new(score))), "{}", strategy);
    }
}

#[tokio::test]
async fn exhausted_runs_report_lowest_score() {
    let expected = [
        (HashStrategy::Ripemd160, 47, 35_703_935),
        (HashStrategy::DoubleSha256, 49, 52_198_122),
    ];

    for (strategy, nonce, score) in expected {
        let job = job(0, strategy).with_max_tries(50);
        let best = Some(BestSoFar {
            score: Score::new(score),
            nonce,
        });

        for mut worker in [
            WorkerFactory::create_batch_worker(3, Duration::from_millis(10)),
            WorkerFactory::create_cpu_worker(4, 5, Duration::from_millis(10)),
        ] {
            let outcome = worker.mine(job, CancellationToken::new(), None).await.unwrap();
            assert_eq!(outcome, MiningOutcome::Exhausted { best, tries: 49 });
        }
    }
}

#[tokio::test]
async fn cancelled_before_start_scores_nothing() {
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let mut worker = BatchWorker::default();
    let outcome = worker
        .mine(job(0, HashStrategy::Ripemd160), cancellation, None)
        .await
        .unwrap();

    assert_matches!(outcome, MiningOutcome::Cancelled { best: None, tries: 0 });
}

#[tokio::test]
async fn stats_stream_ends_with_final_snapshot() {
    let (stats_tx, mut stats_rx) = mpsc::unbounded_channel();
    let mut worker = BatchWorker::default();

    worker
        .mine(
            job(0, HashStrategy::DoubleSha256).with_max_tries(50),
            CancellationToken::new(),
            Some(stats_tx),
        )
        .await
        .unwrap();

    let mut last = None;
    while let Some(stats) = stats_rx.recv().await {
        last = Some(stats);
    }

    let last = last.expect("at least one stats snapshot");
    assert_eq!(last.tries, 49);
    assert_eq!(last.best_nonce, Some(49));
    assert_eq!(last.best_score, Some(Score::new(52_198_122)));
}

#[tokio::test]
async fn config_drives_a_full_run() {
    let config = Config::load_from([
        "larp-miner", "mine", "-p", "1", "-x", "2", "-m", "3", "-t", "50000000", "-s", "b",
        "--worker", "cpu", "-c", "2",
    ])
    .await
    .unwrap();

    let job = config.mining_job().unwrap();
    assert_eq!(job.start_nonce, 0);
    assert_eq!(job.strategy, HashStrategy::DoubleSha256);

    let mut worker = WorkerFactory::create(
        config.worker,
        config.thread_count,
        config.batch_size,
        config.status_interval(),
    );
    assert_eq!(worker.worker_type(), "cpu");

    let outcome = worker.mine(job, CancellationToken::new(), None).await.unwrap();
    assert_eq!(outcome.winner(), Some((2, Score::new(48_619_355))));
}

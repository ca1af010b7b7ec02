//! Configuration management for the larp miner
//!
//! Supports configuration via command line arguments, environment variables
//! and configuration files (YAML/JSON). Values given on the command line or
//! through the environment win over the file, which wins over defaults.

use crate::types::DEFAULT_MAX_TRIES;
use crate::{Error, HashStrategy, MiningJob, Result, ScoreInput};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do with the parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Score a single nonce and compare it with the target
    Verify,
    /// Search for a nonce whose score meets the target
    Mine,
}

/// Worker types supported by the miner
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerType {
    /// Single task, yields between small batches
    Batch,
    /// Multi-threaded CPU search
    Cpu,
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Batch => write!(f, "batch"),
            WorkerType::Cpu => write!(f, "cpu"),
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Json,
}

/// Complete configuration for the miner
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "larp-miner",
    version = env!("CARGO_PKG_VERSION"),
    about = "Toy proof-of-work block scorer and miner",
    long_about = "Scores (prev_block, tx_commit, time_val, target, nonce) with RIPEMD160 or double SHA256 and searches for nonces whose score is at or below the target",
    allow_negative_numbers = true
)]
pub struct Config {
    /// Action to perform
    #[arg(value_enum, default_value = "verify")]
    #[serde(default = "default_action")]
    pub action: Action,

    /// Print program info and exit
    #[arg(long)]
    #[serde(default)]
    pub info: bool,

    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(default)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Previous block id
    #[arg(short = 'p', long)]
    pub prev_block: Option<i64>,

    /// Transaction commitment id
    #[arg(short = 'x', long)]
    pub tx_commit: Option<i64>,

    /// Time value
    #[arg(short = 'm', long)]
    pub time_val: Option<i64>,

    /// Target the block score must not exceed
    #[arg(short = 't', long)]
    pub target: Option<i64>,

    /// Nonce to verify, or the nonce mining starts after
    #[arg(short = 'n', long)]
    pub nonce: Option<i64>,

    /// Hash strategy
    #[arg(short = 's', long, value_enum, env = "LARP_STRATEGY", default_value = "ripemd160")]
    #[serde(default)]
    pub strategy: HashStrategy,

    /// Mining worker type
    #[arg(short = 'w', long, value_enum, env = "LARP_WORKER", default_value = "batch")]
    #[serde(default = "default_worker")]
    pub worker: WorkerType,

    /// Number of CPU worker threads (0 = all cores)
    #[arg(short = 'c', long, default_value = "0")]
    #[serde(default)]
    pub thread_count: usize,

    /// Nonces scored per batch before yielding or checking for cancellation
    /// (default: 3 for the batch worker, 1000 per thread for the cpu worker)
    #[arg(short = 'b', long)]
    pub batch_size: Option<usize>,

    /// Mining stops once the nonce reaches this value
    #[arg(long, default_value = "999999")]
    #[serde(default = "default_max_tries")]
    pub max_tries: i64,

    /// Status report interval in milliseconds
    #[arg(long, default_value = "1000")]
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,

    /// Reject negative parameters instead of truncating them
    #[arg(long)]
    #[serde(default)]
    pub strict: bool,

    /// Log level
    #[arg(short = 'l', long, value_enum, env = "LARP_LOG_LEVEL", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from the process arguments and optional file
    pub async fn load() -> Result<Self> {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches).await
    }

    /// Load configuration from explicit arguments
    pub async fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|e| Error::config(e.to_string()))?;
        Self::from_matches(&matches).await
    }

    async fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut config =
            Self::from_arg_matches(matches).map_err(|e| Error::config(e.to_string()))?;

        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config, matches);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge CLI config with file config
    ///
    /// A field keeps its CLI value only if it was given on the command line
    /// or through the environment; otherwise the file's value is used.
    fn merge_with_file(mut self, file: Self, matches: &ArgMatches) -> Self {
        let explicit = |id: &str| {
            matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
            )
        };

        if !explicit("action") {
            self.action = file.action;
        }

        self.prev_block = self.prev_block.or(file.prev_block);
        self.tx_commit = self.tx_commit.or(file.tx_commit);
        self.time_val = self.time_val.or(file.time_val);
        self.target = self.target.or(file.target);
        self.nonce = self.nonce.or(file.nonce);

        if !explicit("strategy") {
            self.strategy = file.strategy;
        }
        if !explicit("worker") {
            self.worker = file.worker;
        }
        if !explicit("thread_count") {
            self.thread_count = file.thread_count;
        }
        self.batch_size = self.batch_size.or(file.batch_size);
        if !explicit("max_tries") {
            self.max_tries = file.max_tries;
        }
        if !explicit("status_interval_ms") {
            self.status_interval_ms = file.status_interval_ms;
        }
        if !explicit("strict") {
            self.strict = file.strict;
        }
        if !explicit("log_level") {
            self.log_level = file.log_level;
        }
        if !explicit("log_format") {
            self.log_format = file.log_format;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == Some(0) {
            return Err(Error::config("Batch size must be greater than 0"));
        }

        if self.strict && self.max_tries < 0 {
            return Err(Error::config("Max tries must not be negative"));
        }

        Ok(())
    }

    /// The four fixed parameters plus the nonce (0 when not given)
    pub fn score_input(&self) -> Result<ScoreInput> {
        let (Some(prev_block), Some(tx_commit), Some(time_val), Some(target)) =
            (self.prev_block, self.tx_commit, self.time_val, self.target)
        else {
            return Err(Error::invalid_input("Please fill all parameter fields."));
        };

        let input = ScoreInput::new(
            prev_block,
            tx_commit,
            target,
            time_val,
            self.nonce.unwrap_or(0),
        );

        if self.strict {
            input.validate_strict()?;
        }

        Ok(input)
    }

    /// Parameters for a verification; the nonce is required
    pub fn verify_input(&self) -> Result<ScoreInput> {
        let input = self.score_input()?;
        if self.nonce.is_none() {
            return Err(Error::invalid_input("Please enter a nonce to verify."));
        }
        Ok(input)
    }

    /// Mining job described by this configuration
    pub fn mining_job(&self) -> Result<MiningJob> {
        let input = self.score_input()?;
        Ok(MiningJob::new(input, self.strategy).with_max_tries(self.max_tries))
    }

    /// Get status interval duration
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

// Default value functions for serde
fn default_action() -> Action { Action::Verify }
fn default_worker() -> WorkerType { WorkerType::Batch }
fn default_max_tries() -> i64 { DEFAULT_MAX_TRIES }
fn default_status_interval() -> u64 { 1_000 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::cpu::DEFAULT_CPU_BATCH_SIZE;
    use crate::worker::WorkerFactory;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[tokio::test]
    async fn test_config_defaults() {
        let config = Config::load_from(["larp-miner"]).await.unwrap();

        assert_eq!(config.action, Action::Verify);
        assert_eq!(config.strategy, HashStrategy::Ripemd160);
        assert_eq!(config.worker, WorkerType::Batch);
        assert_eq!(config.batch_size, None);
        assert_eq!(config.max_tries, 999_999);
        assert_eq!(config.status_interval(), Duration::from_secs(1));
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(!config.strict);
    }

    #[tokio::test]
    async fn test_cli_parameters() {
        let config = Config::load_from([
            "larp-miner", "mine", "-p", "1", "-x", "2", "-m", "3", "-t", "10000000",
            "--strategy", "double-sha256", "--worker", "cpu", "-c", "4",
        ])
        .await
        .unwrap();

        assert_eq!(config.action, Action::Mine);
        assert_eq!(config.worker, WorkerType::Cpu);
        assert_eq!(config.thread_count, 4);
        assert_eq!(config.batch_size, None);
        assert_eq!(
            WorkerFactory::batch_size(config.worker, config.batch_size),
            DEFAULT_CPU_BATCH_SIZE
        );

        let job = config.mining_job().unwrap();
        assert_eq!(job.input, ScoreInput::new(1, 2, 10_000_000, 3, 0));
        assert_eq!(job.strategy, HashStrategy::DoubleSha256);
        assert_eq!(job.start_nonce, 0);
    }

    #[tokio::test]
    async fn test_negative_values_parse() {
        let config = Config::load_from([
            "larp-miner", "-p", "-1", "-x", "0", "-m", "0", "-t", "0", "-n", "-5",
        ])
        .await
        .unwrap();

        assert_eq!(config.verify_input().unwrap().prev_block, -1);

        let strict = Config { strict: true, ..config };
        assert_matches!(strict.verify_input(), Err(Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_missing_parameters() {
        let config = Config::load_from(["larp-miner", "-p", "1", "-x", "2"])
            .await
            .unwrap();
        assert_matches!(config.score_input(), Err(Error::InvalidInput { .. }));

        let config = Config::load_from(["larp-miner", "-p", "1", "-x", "2", "-m", "3", "-t", "4"])
            .await
            .unwrap();
        assert!(config.mining_job().is_ok());
        assert_matches!(config.verify_input(), Err(Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        assert_matches!(
            Config::load_from(["larp-miner", "-p", "abc"]).await,
            Err(Error::Config { .. })
        );
        assert_matches!(
            Config::load_from(["larp-miner", "--batch-size", "0"]).await,
            Err(Error::Config { .. })
        );
    }

    #[tokio::test]
    async fn test_config_from_yaml() {
        let yaml_content = r#"
action: mine
prev_block: 1
tx_commit: 2
time_val: 3
target: 50000000
strategy: double-sha256
worker: cpu
thread_count: 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.action, Action::Mine);
        assert_eq!(config.prev_block, Some(1));
        assert_eq!(config.target, Some(50_000_000));
        assert_eq!(config.strategy, HashStrategy::DoubleSha256);
        assert_eq!(config.worker, WorkerType::Cpu);
        assert_eq!(config.batch_size, None);
        assert_eq!(config.status_interval_ms, 1_000);
        assert_eq!(config.max_tries, 999_999);
    }

    #[tokio::test]
    async fn test_cli_overrides_file() {
        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            temp_file,
            r#"{{"prev_block": 1, "tx_commit": 2, "time_val": 3, "target": 9, "strategy": "b", "batch_size": 50}}"#
        )
        .unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let config = Config::load_from(["larp-miner", "--config-file", path.as_str(), "-t", "7"])
            .await
            .unwrap();
        assert_eq!(config.target, Some(7));
        assert_eq!(config.prev_block, Some(1));
        assert_eq!(config.strategy, HashStrategy::DoubleSha256);
        assert_eq!(config.batch_size, Some(50));

        let config = Config::load_from([
            "larp-miner", "--config-file", path.as_str(), "--strategy", "ripemd160", "-b", "5",
        ])
        .await
        .unwrap();
        assert_eq!(config.strategy, HashStrategy::Ripemd160);
        assert_eq!(config.batch_size, Some(5));
    }

    #[test]
    fn test_worker_type_display() {
        assert_eq!(WorkerType::Batch.to_string(), "batch");
        assert_eq!(WorkerType::Cpu.to_string(), "cpu");
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing::Level::from(LogLevel::Debug), tracing::Level::DEBUG);
    }
}

//! LARP Miner
//!
//! A deterministic toy proof-of-work scorer and the mining loop around it:
//! - Fixed-layout packing of five integer parameters
//! - RIPEMD160 or double-SHA256 hashing behind one strategy enum
//! - Reduction of the digest to a `u32` block score
//! - Cancellable, resumable mining sessions with cooperative and
//!   multi-threaded workers

pub mod config;
pub mod crypto;
pub mod error;
pub mod packing;
pub mod types;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use crypto::{score, HashStrategy, Scorer};
pub use error::{Error, Result};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "larp-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

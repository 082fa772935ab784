//! reward-topup - keeps staking reward pools funded at a target APY
//!
//! Computes the reward owed to each reward pool for one funding interval and
//! deposits it in a single atomic Solana transaction per staking pool, with
//! throttled, expiry-tolerant submission.

pub mod config;
pub mod error;
pub mod funding;
pub mod keypair;
pub mod notify;
pub mod report;
pub mod runner;
pub mod types;

// Re-export main types for convenience
pub use error::{FundingError, Result};
pub use types::PoolConfig;

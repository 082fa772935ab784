//! Error taxonomy for the top-up pipeline.
//!
//! Errors are scoped: configuration errors abort the whole run, everything
//! else aborts only the pool being processed.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type Result<T, E = FundingError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum FundingError {
    /// A required environment input is absent.
    #[error("{0} is required")]
    ConfigurationMissing(&'static str),

    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("invalid private key")]
    InvalidKeypair,

    /// Single-target allocation addressed a sub-pool that does not exist.
    #[error("target pool index {index:?} is not valid for {len} reward pools")]
    InvalidTargetIndex { index: Option<i64>, len: usize },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("account {0} not found")]
    AccountNotFound(Pubkey),

    #[error("account {address} has unexpected data: {reason}")]
    InvalidAccountData { address: Pubkey, reason: String },

    /// The assembled transaction was rejected before submission.
    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    /// Terminal, non-expiry submission error.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("transaction still expiring after {attempts} submission attempts")]
    SubmissionTimedOut { attempts: u32 },

    #[error("arithmetic overflow in reward calculation")]
    ArithmeticOverflow,

    #[error("amount {0} does not fit a u64 transfer")]
    AmountTooLarge(u128),

    #[error("failed to encode transaction: {0}")]
    Encoding(String),

    #[error("submission throttle is closed")]
    ThrottleClosed,
}

impl FundingError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_account(address: Pubkey, reason: impl Into<String>) -> Self {
        Self::InvalidAccountData {
            address,
            reason: reason.into(),
        }
    }
}

//! Ledger access contract.
//!
//! The funding pipeline only talks to the chain through [`LedgerGateway`], so
//! the RPC client can be swapped for an in-memory ledger in tests.

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

use crate::error::Result;
use crate::funding::types::{FunderBalances, StakingPool, TokenProgram, TransactionCostEstimate};

/// Why a single submission attempt did not commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// The validity window of the transaction's blockhash has passed.
    Expired,
    /// Any other rejection; terminal for the submission.
    Rejected(String),
}

impl SendFailure {
    /// Classifies a ledger error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("expired")
            || lower.contains("block height exceeded")
            || lower.contains("blockhash not found")
        {
            Self::Expired
        } else {
            Self::Rejected(message.to_string())
        }
    }
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "transaction expired"),
            Self::Rejected(reason) => write!(f, "{reason}"),
        }
    }
}

/// Formal contract for ledger reads and raw submission.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Reads a staking pool, its mint precision and every reward pool
    /// attached to it.
    async fn fetch_staking_pool(
        &self,
        address: &Pubkey,
        fee_value: Option<Pubkey>,
    ) -> Result<StakingPool>;

    /// Native and token balances of `funder`. Never fails: read errors are
    /// logged and reported as zeroed balances.
    async fn fetch_funder_balances(
        &self,
        funder: &Pubkey,
        mint: &Pubkey,
        token_program: TokenProgram,
    ) -> FunderBalances;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool>;

    /// Latest finalized blockhash and the last block height it stays valid for.
    async fn latest_blockhash(&self) -> Result<(Hash, u64)>;

    /// Simulates `transaction` without signature verification and quotes its fee.
    async fn estimate_transaction_cost(
        &self,
        transaction: &Transaction,
    ) -> Result<TransactionCostEstimate>;

    /// Sends `transaction` and waits until it is finalized, lands with an
    /// error, or outlives `last_valid_block_height`.
    async fn send_transaction(
        &self,
        transaction: &Transaction,
        last_valid_block_height: u64,
    ) -> std::result::Result<Signature, SendFailure>;
}

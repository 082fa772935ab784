//! Per-run value objects shared by the funding pipeline.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use nonempty::NonEmpty;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    native_token::lamports_to_sol,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};

use crate::error::{FundingError, Result};
use crate::funding::consts::{
    DEFAULT_COMPUTE_UNITS_PER_TRANSFER, DEFAULT_COMPUTE_UNIT_PRICE, PROTOCOL_TREASURY,
    REWARD_POOL_PROGRAM_ID, STAKE_POOL_PROGRAM_ID, TOKEN_2022_PROGRAM_ID,
};

/// On-chain programs the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramIds {
    pub stake_pool: Pubkey,
    pub reward_pool: Pubkey,
    /// Owner of the fee token accounts that `fund_pool` pays into.
    pub treasury: Pubkey,
}

impl Default for ProgramIds {
    fn default() -> Self {
        Self {
            stake_pool: STAKE_POOL_PROGRAM_ID,
            reward_pool: REWARD_POOL_PROGRAM_ID,
            treasury: PROTOCOL_TREASURY,
        }
    }
}

/// Token program owning a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenProgram {
    /// SPL Token
    #[default]
    Standard,
    /// Token-2022
    Extended,
}

impl TokenProgram {
    pub fn from_flag(is_token_2022: bool) -> Self {
        if is_token_2022 {
            Self::Extended
        } else {
            Self::Standard
        }
    }

    pub fn id(self) -> Pubkey {
        match self {
            Self::Standard => spl_token::id(),
            Self::Extended => TOKEN_2022_PROGRAM_ID,
        }
    }
}

/// Staking pool snapshot with the reward pools attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingPool {
    /// Total value locked, in base units of `mint`
    pub tvl: u128,
    pub mint: Pubkey,
    pub decimals: u8,
    pub reward_pools: Vec<RewardSubPool>,
    pub fee_value: Option<Pubkey>,
}

/// Read-only snapshot of one reward pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardSubPool {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub vault: Pubkey,
    pub funded_amount: u128,
    pub claimed_amount: u128,
    pub last_amount: u128,
    /// Unix seconds
    pub created_ts: i64,
    pub decimals: u8,
}

/// Amount owed to one reward pool for this interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolFunding {
    pub pool_address: Pubkey,
    pub mint: Pubkey,
    pub vault: Pubkey,
    pub tokens_needed: u128,
    pub fee_value: Option<Pubkey>,
}

/// Output of the allocation step. `total_tokens_needed` is always the exact
/// sum of `per_pool`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FundingPlan {
    pub total_tokens_needed: u128,
    pub per_pool: Vec<PoolFunding>,
}

impl FundingPlan {
    pub fn is_empty(&self) -> bool {
        self.total_tokens_needed == 0
    }

    pub fn transfer_items(&self, token_program: TokenProgram) -> Vec<BatchTransferItem> {
        self.per_pool
            .iter()
            .map(|pool| BatchTransferItem {
                mint: pool.mint,
                recipient: pool.pool_address,
                vault: pool.vault,
                amount: pool.tokens_needed,
                fee_value: pool.fee_value,
                token_program,
            })
            .collect()
    }
}

/// Point-in-time balances of a funder wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunderBalances {
    pub wallet: Pubkey,
    pub lamports: u64,
    pub token_account: Pubkey,
    pub token_amount: u128,
}

impl FunderBalances {
    /// Balances reported when the ledger could not be read.
    pub fn zeroed(wallet: Pubkey) -> Self {
        Self {
            wallet,
            lamports: 0,
            token_account: Pubkey::default(),
            token_amount: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionCostEstimate {
    pub fee_lamports: u64,
    /// Display only; never compare against lamport balances.
    pub fee_sol: f64,
    /// Not available when the simulation did not report it
    pub compute_units: Option<u64>,
}

impl TransactionCostEstimate {
    pub fn from_lamports(fee_lamports: u64, compute_units: Option<u64>) -> Self {
        Self {
            fee_lamports,
            fee_sol: lamports_to_sol(fee_lamports),
            compute_units,
        }
    }
}

/// One `fund_pool` transfer inside a batch transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTransferItem {
    pub mint: Pubkey,
    /// Reward pool receiving the funds
    pub recipient: Pubkey,
    pub vault: Pubkey,
    pub amount: u128,
    pub fee_value: Option<Pubkey>,
    pub token_program: TokenProgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeBudget {
    pub unit_limit: u32,
    pub unit_price_micro_lamports: u64,
}

impl ComputeBudget {
    /// Budget sized for `transfers` fund-pool instructions at the default price.
    pub fn for_transfers(transfers: usize) -> Self {
        let transfers = u32::try_from(transfers.max(1)).unwrap_or(u32::MAX);
        Self {
            unit_limit: DEFAULT_COMPUTE_UNITS_PER_TRANSFER.saturating_mul(transfers),
            unit_price_micro_lamports: DEFAULT_COMPUTE_UNIT_PRICE,
        }
    }

    pub fn with_price(mut self, micro_lamports: u64) -> Self {
        self.unit_price_micro_lamports = micro_lamports;
        self
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        vec![
            ComputeBudgetInstruction::set_compute_unit_limit(self.unit_limit),
            ComputeBudgetInstruction::set_compute_unit_price(self.unit_price_micro_lamports),
        ]
    }
}

/// A signed batch transaction plus the validity window it was built for.
#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub transaction: Transaction,
    pub blockhash: Hash,
    /// Last block height at which the ledger accepts `blockhash`
    pub last_valid_block_height: u64,
    pub items: NonEmpty<BatchTransferItem>,
}

impl PreparedTransaction {
    pub fn signature(&self) -> Signature {
        self.transaction.signatures.first().copied().unwrap_or_default()
    }

    pub fn total_amount(&self) -> u128 {
        self.items.iter().map(|item| item.amount).sum()
    }

    /// Human-readable list of the transfers, for logs.
    pub fn summary(&self) -> String {
        self.items
            .iter()
            .map(|t| format!("{} of {} to {}", t.amount, t.mint, t.recipient))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Wire-format transaction, base64 encoded.
    pub fn to_base64(&self) -> Result<String> {
        let bytes = bincode::serialize(&self.transaction)
            .map_err(|e| FundingError::Encoding(e.to_string()))?;
        Ok(BASE64.encode(bytes))
    }
}

//! Funding pipeline: reward math, allocation, ledger access, transaction
//! assembly and submission.

pub mod consts;
pub mod types;
pub mod reward_math;
pub mod allocation;
pub mod layout;
pub mod instruction;
pub mod gateway;
pub mod rpc_gateway;
pub mod orchestrator;
pub mod throttle;
pub mod submission;

// Re-export main types
pub use types::{
    BatchTransferItem, ComputeBudget, FunderBalances, FundingPlan, PoolFunding,
    PreparedTransaction, ProgramIds, RewardSubPool, StakingPool, TokenProgram,
    TransactionCostEstimate,
};

// Re-export key components
pub use allocation::{allocate, DistributionStrategy};
pub use gateway::{LedgerGateway, SendFailure};
pub use orchestrator::TransferOrchestrator;
pub use reward_math::{interval_reward, AnnualRate};
pub use rpc_gateway::RpcLedgerGateway;
pub use submission::{SubmissionEngine, SubmissionPolicy};
pub use throttle::{SubmissionThrottle, ThrottlePermit};

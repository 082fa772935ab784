//! Splits an interval reward across the reward pools of a staking pool.

use crate::error::{FundingError, Result};
use crate::funding::reward_math::{reward_for_rate, AnnualRate};
use crate::funding::types::{FundingPlan, PoolFunding, RewardSubPool, StakingPool};

/// How a computed reward is distributed over reward pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistributionStrategy {
    /// Every reward pool receives the full reward computed off the pool TVL.
    #[default]
    Proportional,
    /// Only the reward pool at `index` is funded.
    SingleTarget { index: Option<i64> },
}

/// Builds the funding plan for one staking pool over one interval.
pub fn allocate(
    pool: &StakingPool,
    interval_minutes: u64,
    rate: AnnualRate,
    strategy: DistributionStrategy,
) -> Result<FundingPlan> {
    match strategy {
        DistributionStrategy::Proportional => {
            if pool.reward_pools.is_empty() {
                return Ok(FundingPlan::default());
            }

            let tokens_needed = reward_for_rate(pool.tvl, rate, interval_minutes)?;
            let per_pool: Vec<PoolFunding> = pool
                .reward_pools
                .iter()
                .map(|reward_pool| funding_for(pool, reward_pool, tokens_needed))
                .collect();
            let total_tokens_needed = per_pool.iter().try_fold(0u128, |acc, p| {
                acc.checked_add(p.tokens_needed)
                    .ok_or(FundingError::ArithmeticOverflow)
            })?;

            Ok(FundingPlan {
                total_tokens_needed,
                per_pool,
            })
        }
        DistributionStrategy::SingleTarget { index } => {
            let len = pool.reward_pools.len();
            let reward_pool = index
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| pool.reward_pools.get(i))
                .ok_or(FundingError::InvalidTargetIndex { index, len })?;

            let tokens_needed = reward_for_rate(pool.tvl, rate, interval_minutes)?;

            Ok(FundingPlan {
                total_tokens_needed: tokens_needed,
                per_pool: vec![funding_for(pool, reward_pool, tokens_needed)],
            })
        }
    }
}

fn funding_for(pool: &StakingPool, reward_pool: &RewardSubPool, tokens_needed: u128) -> PoolFunding {
    PoolFunding {
        pool_address: reward_pool.address,
        mint: reward_pool.mint,
        vault: reward_pool.vault,
        tokens_needed,
        fee_value: pool.fee_value,
    }
}

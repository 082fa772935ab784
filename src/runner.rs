//! The per-pool top-up cycle.
//!
//! Pools are processed one after another. Each attempted pool yields exactly
//! one [`PoolResult`]; a failing pool is reported and notified, and the run
//! moves on to the next one.

use std::sync::Arc;

use solana_sdk::signature::{Signature, Signer};
use tracing::{error, info, instrument, warn};

use crate::error::{FundingError, Result};
use crate::funding::consts::DEFAULT_COMPUTE_UNIT_PRICE;
use crate::funding::{
    allocate, ComputeBudget, LedgerGateway, ProgramIds, SubmissionEngine, SubmissionPolicy,
    SubmissionThrottle, TransferOrchestrator,
};
use crate::notify::Notifier;
use crate::report::{PoolOutcome, PoolResult, Report, NOT_APPLICABLE};
use crate::types::PoolConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Lamports at or below which a low-balance alert is raised
    pub sol_balance_warning_threshold: Option<u64>,
    pub compute_unit_price: u64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            sol_balance_warning_threshold: None,
            compute_unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
        }
    }
}

pub struct TopUpRunner {
    gateway: Arc<dyn LedgerGateway>,
    orchestrator: TransferOrchestrator,
    engine: SubmissionEngine,
    throttle: Arc<SubmissionThrottle>,
    notifier: Arc<dyn Notifier>,
    settings: RunnerSettings,
}

/// Values learned so far for the pool being processed; a failure part-way
/// through still reports them.
#[derive(Debug, Default)]
struct Progress {
    current_staked: Option<u128>,
    funder_token_balance: Option<u128>,
    required_top_up: Option<u128>,
}

impl Progress {
    fn finish(&self, pool: &PoolConfig, outcome: PoolOutcome) -> PoolResult {
        self.finish_with(pool, outcome, None)
    }

    fn finish_with(
        &self,
        pool: &PoolConfig,
        outcome: PoolOutcome,
        tx_signature: Option<Signature>,
    ) -> PoolResult {
        PoolResult {
            id: pool.id.clone(),
            name: pool.name.clone(),
            current_staked: self.current_staked,
            funder_token_balance: self.funder_token_balance,
            required_top_up: self.required_top_up,
            tx_signature,
            outcome,
        }
    }
}

impl TopUpRunner {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        programs: ProgramIds,
        policy: SubmissionPolicy,
        throttle: Arc<SubmissionThrottle>,
        notifier: Arc<dyn Notifier>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            orchestrator: TransferOrchestrator::new(gateway.clone(), programs),
            engine: SubmissionEngine::new(gateway.clone(), policy),
            gateway,
            throttle,
            notifier,
            settings,
        }
    }

    pub async fn run(&self, pools: &[&PoolConfig]) -> Report {
        info!("Processing {} pools", pools.len());

        let mut results = Vec::with_capacity(pools.len());
        for pool in pools {
            results.push(self.process_pool(pool).await);
        }

        for result in &results {
            info!(
                "Pool id - {}, pool name - {}, tx - {}",
                result.id,
                result.name,
                result
                    .tx_signature
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| NOT_APPLICABLE.to_string())
            );
        }

        Report::new(results)
    }

    #[instrument(skip(self, pool), fields(pool_id = %pool.id, pool_name = %pool.name))]
    pub async fn process_pool(&self, pool: &PoolConfig) -> PoolResult {
        info!("Processing pool: id - {}, name - {}", pool.id, pool.name);

        let mut progress = Progress::default();
        match self.top_up(pool, &mut progress).await {
            Ok(result) => result,
            Err(e) => {
                let message = format!(
                    "Pool id - {}, pool name - {}: Top-up failed: {}",
                    pool.id, pool.name, e
                );
                error!("{}", message);
                self.notifier.notify("Top-up failed", &message).await;
                progress.finish(pool, PoolOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn top_up(&self, pool: &PoolConfig, progress: &mut Progress) -> Result<PoolResult> {
        let funder = pool.keypair();
        let token_program = pool.token_program();

        let staking_pool = self
            .gateway
            .fetch_staking_pool(&pool.stake_pool_address, pool.fee_value)
            .await?;
        progress.current_staked = Some(staking_pool.tvl);

        let balances = self
            .gateway
            .fetch_funder_balances(&funder.pubkey(), &staking_pool.mint, token_program)
            .await;
        progress.funder_token_balance = Some(balances.token_amount);

        if balances.lamports == 0 {
            let message = format!(
                "Pool {}: Not enough SOL balance in wallet {} to top-up",
                pool.name, balances.wallet
            );
            error!("{}", message);
            self.notifier.notify("Insufficient SOL balance", &message).await;
            return Ok(progress.finish(pool, PoolOutcome::InsufficientSol));
        }

        if let Some(threshold) = self.settings.sol_balance_warning_threshold {
            if balances.lamports <= threshold {
                let message = format!(
                    "Pool {}: SOL balance is low: {}, threshold: {}",
                    pool.name, balances.lamports, threshold
                );
                warn!("{}", message);
                self.notifier.notify("Low SOL balance", &message).await;
            }
        }

        let plan = allocate(
            &staking_pool,
            pool.funding_period_minutes,
            pool.annual_rate()?,
            pool.strategy(),
        )?;
        progress.required_top_up = Some(plan.total_tokens_needed);

        if plan.is_empty() {
            info!("Pool {}: No top-up needed", pool.name);
            return Ok(progress.finish(pool, PoolOutcome::NoTopUpNeeded));
        }

        if plan.total_tokens_needed > balances.token_amount {
            let message = format!(
                "Pool {}: Not enough balance in wallet to top-up, needs {} has {}",
                pool.name, plan.total_tokens_needed, balances.token_amount
            );
            error!("{}", message);
            self.notifier.notify("Insufficient token balance", &message).await;
            return Ok(progress.finish(pool, PoolOutcome::InsufficientTokens));
        }

        let items = plan.transfer_items(token_program);
        let budget =
            ComputeBudget::for_transfers(items.len()).with_price(self.settings.compute_unit_price);
        let prepared = self
            .orchestrator
            .prepare_batch(funder, items, budget)
            .await?
            .ok_or_else(|| FundingError::SubmissionFailed("failed to prepare batch transaction".into()))?;

        let cost = self
            .gateway
            .estimate_transaction_cost(&prepared.transaction)
            .await?;
        info!(
            "Estimated fee {} lamports ({} SOL), {} compute units",
            cost.fee_lamports,
            cost.fee_sol,
            cost.compute_units
                .map(|units| units.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        if cost.fee_lamports > balances.lamports {
            let message = format!(
                "Pool {}: Not enough SOL balance in wallet {} to top-up",
                pool.name, balances.wallet
            );
            error!("{}", message);
            self.notifier.notify("Insufficient SOL balance", &message).await;
            return Ok(progress.finish(pool, PoolOutcome::InsufficientFeeBalance));
        }

        let signature = self.engine.submit(&prepared, &self.throttle).await?;
        info!(
            "Pool id - {}, pool name - {}: Top-up completed. tx - {}",
            pool.id,
            pool.name,
            signature
                .map(|s| s.to_string())
                .unwrap_or_else(|| NOT_APPLICABLE.to_string())
        );

        let outcome = match signature {
            Some(_) => PoolOutcome::ToppedUp,
            None => PoolOutcome::Simulated,
        };
        Ok(progress.finish_with(pool, outcome, signature))
    }
}

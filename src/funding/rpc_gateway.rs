//! [`LedgerGateway`] backed by a Solana JSON-RPC endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcProgramAccountsConfig, RpcSendTransactionConfig, RpcSimulateTransactionConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::Transaction,
};
use solana_transaction_status::{TransactionConfirmationStatus, TransactionStatus};
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, info, instrument, warn};

use crate::error::{FundingError, Result};
use crate::funding::gateway::{LedgerGateway, SendFailure};
use crate::funding::instruction::token_account;
use crate::funding::layout::{mint_decimals, AnchorAccount, RewardPool, StakePool, REWARD_POOL_STAKE_POOL_OFFSET};
use crate::funding::types::{
    FunderBalances, ProgramIds, RewardSubPool, StakingPool, TokenProgram, TransactionCostEstimate,
};

const DEFAULT_RETRY_ATTEMPTS: usize = 3;
const DEFAULT_CONFIRM_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Consecutive failed status polls tolerated before giving up on a send.
const MAX_POLL_ERRORS: u32 = 10;

pub struct RpcLedgerGateway {
    rpc: Arc<RpcClient>,
    programs: ProgramIds,
    retry_attempts: usize,
    confirm_poll_interval: Duration,
    /// Mint decimals, kept for the process lifetime
    mint_decimals: Cache<Pubkey, u8>,
}

impl RpcLedgerGateway {
    pub fn new(rpc: Arc<RpcClient>, programs: ProgramIds) -> Self {
        Self {
            rpc,
            programs,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            confirm_poll_interval: DEFAULT_CONFIRM_POLL_INTERVAL,
            mint_decimals: Cache::builder().max_capacity(1_024).build(),
        }
    }

    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_confirm_poll_interval(mut self, interval: Duration) -> Self {
        self.confirm_poll_interval = interval;
        self
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.retry_attempts)
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        Retry::spawn(self.retry_strategy(), || async move {
            self.rpc
                .get_account_with_commitment(address, self.rpc.commitment())
                .await
                .map(|response| response.value)
                .map_err(|e| FundingError::LedgerUnavailable(e.to_string()))
        })
        .await
    }

    async fn require_account(&self, address: &Pubkey) -> Result<Account> {
        self.get_account(address)
            .await?
            .ok_or(FundingError::AccountNotFound(*address))
    }

    async fn decimals_of(&self, mint: Pubkey) -> Result<u8> {
        self.mint_decimals
            .try_get_with(mint, async move {
                let account = self.require_account(&mint).await?;
                mint_decimals(&mint, &account.owner, &account.data)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    async fn fetch_reward_pools(&self, staking_pool: &Pubkey) -> Result<Vec<RewardSubPool>> {
        let config = RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
                REWARD_POOL_STAKE_POOL_OFFSET,
                staking_pool.as_ref(),
            ))]),
            ..Default::default()
        };

        let config = &config;
        let accounts = Retry::spawn(self.retry_strategy(), || async move {
            self.rpc
                .get_program_accounts_with_config(&self.programs.reward_pool, config.clone())
                .await
                .map_err(|e| FundingError::LedgerUnavailable(e.to_string()))
        })
        .await?;

        let mut reward_pools = Vec::with_capacity(accounts.len());
        for (address, account) in accounts {
            let decoded = RewardPool::try_from_account(&address, &account.data)?;
            let decimals = self.decimals_of(decoded.mint()).await?;
            reward_pools.push(RewardSubPool {
                address,
                mint: decoded.mint(),
                vault: decoded.vault(),
                funded_amount: decoded.funded_amount().into(),
                claimed_amount: decoded.claimed_amount().into(),
                last_amount: decoded.last_amount().into(),
                created_ts: i64::try_from(decoded.created_ts()).unwrap_or(i64::MAX),
                decimals,
            });
        }

        // Listing order is not guaranteed by the node; single-target indexes
        // refer to this order.
        reward_pools.sort_by_key(|pool| (pool.created_ts, pool.address));
        Ok(reward_pools)
    }

    async fn read_balances(
        &self,
        funder: &Pubkey,
        token_account: &Pubkey,
    ) -> Result<(u64, u128)> {
        let (lamports, token) = tokio::try_join!(
            async {
                self.rpc
                    .get_balance(funder)
                    .await
                    .map_err(|e| FundingError::LedgerUnavailable(e.to_string()))
            },
            async {
                self.rpc
                    .get_token_account_balance(token_account)
                    .await
                    .map_err(|e| FundingError::LedgerUnavailable(e.to_string()))
            },
        )?;

        let token_amount = token.amount.parse::<u128>().map_err(|e| {
            FundingError::invalid_account(*token_account, format!("token amount: {e}"))
        })?;
        Ok((lamports, token_amount))
    }
}

#[async_trait]
impl LedgerGateway for RpcLedgerGateway {
    #[instrument(skip(self), fields(pool = %address))]
    async fn fetch_staking_pool(
        &self,
        address: &Pubkey,
        fee_value: Option<Pubkey>,
    ) -> Result<StakingPool> {
        let account = self.require_account(address).await?;
        if account.owner != self.programs.stake_pool {
            return Err(FundingError::invalid_account(
                *address,
                format!("owned by {}, not the stake pool program", account.owner),
            ));
        }

        let decoded = *StakePool::try_from_account(address, &account.data)?;
        let decimals = self.decimals_of(decoded.mint()).await?;
        let reward_pools = self.fetch_reward_pools(address).await?;

        debug!(
            "Staking pool {} holds {} of {} across {} reward pools",
            address,
            decoded.total_stake(),
            decoded.mint(),
            reward_pools.len()
        );

        Ok(StakingPool {
            tvl: decoded.total_stake().into(),
            mint: decoded.mint(),
            decimals,
            reward_pools,
            fee_value,
        })
    }

    #[instrument(skip(self), fields(funder = %funder, mint = %mint))]
    async fn fetch_funder_balances(
        &self,
        funder: &Pubkey,
        mint: &Pubkey,
        token_program: TokenProgram,
    ) -> FunderBalances {
        let token_account = token_account(funder, mint, token_program);
        match self.read_balances(funder, &token_account).await {
            Ok((lamports, token_amount)) => FunderBalances {
                wallet: *funder,
                lamports,
                token_account,
                token_amount,
            },
            Err(e) => {
                warn!("Failed to read funder balances: {}", e);
                FunderBalances::zeroed(*funder)
            }
        }
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        Ok(self.get_account(address).await?.is_some())
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        Retry::spawn(self.retry_strategy(), || async move {
            self.rpc
                .get_latest_blockhash_with_commitment(CommitmentConfig::finalized())
                .await
                .map_err(|e| FundingError::LedgerUnavailable(e.to_string()))
        })
        .await
    }

    #[instrument(skip(self, transaction))]
    async fn estimate_transaction_cost(
        &self,
        transaction: &Transaction,
    ) -> Result<TransactionCostEstimate> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            commitment: Some(CommitmentConfig::confirmed()),
            inner_instructions: true,
            ..Default::default()
        };

        let simulation = self
            .rpc
            .simulate_transaction_with_config(transaction, config)
            .await
            .map_err(|e| FundingError::SimulationFailed(e.to_string()))?
            .value;

        for line in simulation.logs.iter().flatten() {
            debug!("simulation: {}", line);
        }
        if let Some(err) = simulation.err {
            return Err(FundingError::SimulationFailed(err.to_string()));
        }

        let fee_lamports = self
            .rpc
            .get_fee_for_message(&transaction.message)
            .await
            .map_err(|e| FundingError::LedgerUnavailable(e.to_string()))?;

        Ok(TransactionCostEstimate::from_lamports(
            fee_lamports,
            simulation.units_consumed,
        ))
    }

    #[instrument(skip(self, transaction), fields(signature = %transaction.signatures.first().copied().unwrap_or_default()))]
    async fn send_transaction(
        &self,
        transaction: &Transaction,
        last_valid_block_height: u64,
    ) -> std::result::Result<Signature, SendFailure> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..Default::default()
        };

        let signature = self
            .rpc
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| SendFailure::classify(&e.to_string()))?;

        let mut poll_errors = 0u32;
        loop {
            tokio::time::sleep(self.confirm_poll_interval).await;

            let status = match self.rpc.get_signature_statuses(&[signature]).await {
                Ok(response) => {
                    poll_errors = 0;
                    response.value.into_iter().next().flatten()
                }
                Err(e) => {
                    poll_errors += 1;
                    warn!("Status poll failed ({}/{}): {}", poll_errors, MAX_POLL_ERRORS, e);
                    if poll_errors >= MAX_POLL_ERRORS {
                        return Err(SendFailure::Rejected(e.to_string()));
                    }
                    continue;
                }
            };

            match status.as_ref().map(confirmation) {
                Some(Confirmation::Finalized) => {
                    info!("Transaction {} finalized", signature);
                    return Ok(signature);
                }
                Some(Confirmation::Failed(reason)) => return Err(SendFailure::Rejected(reason)),
                Some(Confirmation::Pending) => continue,
                None => {}
            }

            match self.rpc.get_block_height().await {
                Ok(height) if height > last_valid_block_height => {
                    return Err(SendFailure::Expired);
                }
                Ok(_) => {
                    // Not seen yet; rebroadcast since the node was told not to retry.
                    if let Err(e) = self.rpc.send_transaction_with_config(transaction, config).await {
                        debug!("Rebroadcast failed: {}", e);
                    }
                }
                Err(e) => debug!("Block height unavailable: {}", e),
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Confirmation {
    Finalized,
    Failed(String),
    Pending,
}

fn confirmation(status: &TransactionStatus) -> Confirmation {
    if let Some(err) = &status.err {
        return Confirmation::Failed(err.to_string());
    }
    match &status.confirmation_status {
        Some(TransactionConfirmationStatus::Finalized) => Confirmation::Finalized,
        // Rooted statuses come back without a confirmation count
        None if status.confirmations.is_none() => Confirmation::Finalized,
        _ => Confirmation::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{instruction::InstructionError, transaction::TransactionError};

    fn status(
        confirmation_status: Option<TransactionConfirmationStatus>,
        confirmations: Option<usize>,
        err: Option<TransactionError>,
    ) -> TransactionStatus {
        TransactionStatus {
            slot: 1,
            confirmations,
            status: match &err {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            },
            err,
            confirmation_status,
        }
    }

    #[test]
    fn test_confirmation_levels() {
        assert_eq!(
            confirmation(&status(Some(TransactionConfirmationStatus::Finalized), None, None)),
            Confirmation::Finalized
        );
        assert_eq!(
            confirmation(&status(Some(TransactionConfirmationStatus::Confirmed), Some(3), None)),
            Confirmation::Pending
        );
        assert_eq!(
            confirmation(&status(Some(TransactionConfirmationStatus::Processed), Some(0), None)),
            Confirmation::Pending
        );
        assert_eq!(confirmation(&status(None, None, None)), Confirmation::Finalized);
    }

    #[test]
    fn test_landed_error_is_failure() {
        let err = TransactionError::InstructionError(0, InstructionError::Custom(6001));
        assert!(matches!(
            confirmation(&status(Some(TransactionConfirmationStatus::Confirmed), Some(1), Some(err))),
            Confirmation::Failed(_)
        ));
    }

    fn unreachable_gateway() -> RpcLedgerGateway {
        let rpc = Arc::new(RpcClient::new_mock("fails".to_string()));
        RpcLedgerGateway::new(rpc, ProgramIds::default()).with_retry_attempts(0)
    }

    #[tokio::test]
    async fn test_unreadable_balances_are_zeroed() {
        let gateway = unreachable_gateway();
        let funder = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let balances = gateway
            .fetch_funder_balances(&funder, &mint, TokenProgram::Standard)
            .await;

        assert_eq!(balances.wallet, funder);
        assert_eq!(balances.lamports, 0);
        assert_eq!(balances.token_amount, 0);
    }

    #[tokio::test]
    async fn test_failed_reads_are_ledger_unavailable() {
        let gateway = unreachable_gateway();
        let address = Pubkey::new_unique();

        assert!(matches!(
            gateway.fetch_staking_pool(&address, None).await,
            Err(FundingError::LedgerUnavailable(_))
        ));
        assert!(matches!(
            gateway.account_exists(&address).await,
            Err(FundingError::LedgerUnavailable(_))
        ));
        assert!(matches!(
            gateway.latest_blockhash().await,
            Err(FundingError::LedgerUnavailable(_))
        ));
    }
}

//! In-memory ledger and notifier shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reward_topup::error::{FundingError, Result};
use reward_topup::funding::{
    FunderBalances, LedgerGateway, RewardSubPool, SendFailure, StakingPool, TokenProgram,
    TransactionCostEstimate,
};
use reward_topup::notify::Notifier;
use reward_topup::types::PoolConfig;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};

#[derive(Default)]
struct LedgerState {
    pools: HashMap<Pubkey, StakingPool>,
    balances: HashMap<Pubkey, (u64, u128)>,
    existing_accounts: HashSet<Pubkey>,
    cost_lamports: u64,
    simulation_error: Option<String>,
    send_script: VecDeque<std::result::Result<(), SendFailure>>,
    sent: Vec<Transaction>,
    blockhash_calls: usize,
}

/// Ledger fake. Sends succeed unless a scripted outcome is queued.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        let ledger = Self::default();
        ledger.state.lock().unwrap().cost_lamports = 5_000;
        Arc::new(ledger)
    }

    pub fn add_pool(&self, address: Pubkey, pool: StakingPool) {
        self.state.lock().unwrap().pools.insert(address, pool);
    }

    pub fn set_balances(&self, funder: Pubkey, lamports: u64, tokens: u128) {
        self.state.lock().unwrap().balances.insert(funder, (lamports, tokens));
    }

    pub fn add_account(&self, address: Pubkey) {
        self.state.lock().unwrap().existing_accounts.insert(address);
    }

    pub fn set_cost(&self, lamports: u64) {
        self.state.lock().unwrap().cost_lamports = lamports;
    }

    pub fn fail_simulation(&self, reason: &str) {
        self.state.lock().unwrap().simulation_error = Some(reason.to_string());
    }

    pub fn script_sends(&self, outcomes: impl IntoIterator<Item = std::result::Result<(), SendFailure>>) {
        self.state.lock().unwrap().send_script.extend(outcomes);
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn blockhash_calls(&self) -> usize {
        self.state.lock().unwrap().blockhash_calls
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn fetch_staking_pool(&self, address: &Pubkey, fee_value: Option<Pubkey>) -> Result<StakingPool> {
        let state = self.state.lock().unwrap();
        let mut pool = state
            .pools
            .get(address)
            .cloned()
            .ok_or(FundingError::AccountNotFound(*address))?;
        pool.fee_value = fee_value;
        Ok(pool)
    }

    async fn fetch_funder_balances(
        &self,
        funder: &Pubkey,
        _mint: &Pubkey,
        _token_program: TokenProgram,
    ) -> FunderBalances {
        let state = self.state.lock().unwrap();
        match state.balances.get(funder) {
            Some((lamports, tokens)) => FunderBalances {
                wallet: *funder,
                lamports: *lamports,
                token_account: Pubkey::new_unique(),
                token_amount: *tokens,
            },
            None => FunderBalances::zeroed(*funder),
        }
    }

    async fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        Ok(self.state.lock().unwrap().existing_accounts.contains(address))
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64)> {
        let mut state = self.state.lock().unwrap();
        state.blockhash_calls += 1;
        Ok((Hash::new_unique(), 1_000))
    }

    async fn estimate_transaction_cost(&self, _transaction: &Transaction) -> Result<TransactionCostEstimate> {
        let state = self.state.lock().unwrap();
        match &state.simulation_error {
            Some(reason) => Err(FundingError::SimulationFailed(reason.clone())),
            None => Ok(TransactionCostEstimate::from_lamports(state.cost_lamports, Some(42_000))),
        }
    }

    async fn send_transaction(
        &self,
        transaction: &Transaction,
        _last_valid_block_height: u64,
    ) -> std::result::Result<Signature, SendFailure> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.sent.push(transaction.clone());
            state.send_script.pop_front().unwrap_or(Ok(()))
        };
        tokio::task::yield_now().await;
        outcome.map(|()| transaction.signatures[0])
    }
}

/// Records every alert it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

pub fn mock_staking_pool(tvl: u128, reward_pools: usize) -> StakingPool {
    let mint = Pubkey::new_unique();
    StakingPool {
        tvl,
        mint,
        decimals: 6,
        reward_pools: (0..reward_pools)
            .map(|i| RewardSubPool {
                address: Pubkey::new_unique(),
                mint,
                vault: Pubkey::new_unique(),
                funded_amount: 0,
                claimed_amount: 0,
                last_amount: 0,
                created_ts: 1_700_000_000 + i as i64,
                decimals: 6,
            })
            .collect(),
        fee_value: None,
    }
}

/// Pool config in the deployed JSON shape.
pub fn pool_config(id: &str, stake_pool: &Pubkey, funder: &Keypair, apy: f64, extra: &str) -> PoolConfig {
    let json = format!(
        r#"{{"id":"{id}","name":"{id} pool","stakePoolAddress":"{stake_pool}","privateKey":"{}","targetAPY":{apy},"fundingPeriodMinutes":1440,"isToken2022":false{extra}}}"#,
        funder.to_base58_string()
    );
    serde_json::from_str(&json).unwrap()
}

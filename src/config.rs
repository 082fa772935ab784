//! Run configuration, read once from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;

use crate::error::{FundingError, Result};
use crate::funding::consts::{DEFAULT_SEND_CONCURRENCY, DEFAULT_SEND_RATE_PER_SECOND, DEFAULT_SUBMIT_MAX_ATTEMPTS};
use crate::funding::ProgramIds;
use crate::types::PoolConfig;

pub const DEFAULT_RESULT_PATH: &str = "/tmp/result.csv";
pub const DEFAULT_RPC_TIMEOUT_SECONDS: u64 = 30;

/// Where alerts go and what run they point back to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyConfig {
    /// Alerts are skipped when unset
    pub webhook_url: Option<String>,
    pub workflow: Option<String>,
    pub run_url: Option<String>,
}

impl NotifyConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads only the alert variables, so it also works when the rest of the
    /// configuration is missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let run_url = match (get("GITHUB_REPOSITORY"), get("GITHUB_RUN_ID")) {
            (Some(repo), Some(run)) => Some(format!("https://github.com/{repo}/actions/runs/{run}")),
            _ => None,
        };
        Self {
            webhook_url: get("WEBHOOK_URL"),
            workflow: get("GITHUB_WORKFLOW"),
            run_url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub rpc_url: String,
    /// Every configured pool, in deployment order
    pub pools: Vec<PoolConfig>,
    /// Scheduling period of this invocation; selects the pools to process
    pub period_minutes: u64,
    pub dry_run: bool,
    pub debug_log: bool,
    /// Lamports at or below which a low-balance alert is raised
    pub sol_balance_warning_threshold: Option<u64>,
    pub notify: NotifyConfig,
    pub result_path: PathBuf,
    /// `None` retries expired submissions without bound
    pub submit_max_attempts: Option<u32>,
    pub send_concurrency: usize,
    pub send_rate_per_second: u32,
    pub rpc_timeout: Duration,
    pub programs: ProgramIds,
}

impl RunConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let notify = NotifyConfig::from_lookup(&lookup);
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let rpc_url = get("RPC_URL").ok_or(FundingError::ConfigurationMissing("RPC_URL"))?;
        let pools_json = get("POOL_CONFIGS").ok_or(FundingError::ConfigurationMissing("POOL_CONFIGS"))?;
        let period_minutes: u64 = parse(
            "PERIOD_IN_MINUTES",
            &get("PERIOD_IN_MINUTES").ok_or(FundingError::ConfigurationMissing("PERIOD_IN_MINUTES"))?,
        )?;
        if period_minutes == 0 {
            return Err(FundingError::invalid_config("PERIOD_IN_MINUTES", "must be positive"));
        }

        let pools: Vec<PoolConfig> = serde_json::from_str(&pools_json)
            .map_err(|e| FundingError::invalid_config("POOL_CONFIGS", e.to_string()))?;
        for pool in &pools {
            pool.annual_rate()
                .map_err(|e| FundingError::invalid_config(format!("POOL_CONFIGS[{}]", pool.id), e.to_string()))?;
            if pool.funding_period_minutes == 0 {
                return Err(FundingError::invalid_config(
                    format!("POOL_CONFIGS[{}]", pool.id),
                    "fundingPeriodMinutes must be positive",
                ));
            }
        }

        let mut programs = ProgramIds::default();
        if let Some(raw) = get("STAKE_POOL_PROGRAM_ID") {
            programs.stake_pool = parse("STAKE_POOL_PROGRAM_ID", &raw)?;
        }
        if let Some(raw) = get("REWARD_POOL_PROGRAM_ID") {
            programs.reward_pool = parse::<Pubkey>("REWARD_POOL_PROGRAM_ID", &raw)?;
        }

        let submit_max_attempts = match get("SUBMIT_MAX_ATTEMPTS") {
            Some(raw) => parse::<u32>("SUBMIT_MAX_ATTEMPTS", &raw)?,
            None => DEFAULT_SUBMIT_MAX_ATTEMPTS,
        };

        Ok(Self {
            rpc_url,
            pools,
            period_minutes,
            dry_run: get("DRY_RUN").is_some_and(|v| v == "1"),
            debug_log: get("DEBUG_LOG").is_some_and(|v| v == "true"),
            sol_balance_warning_threshold: get("SOL_BALANCE_WARNING_THRESHOLD")
                .map(|raw| parse("SOL_BALANCE_WARNING_THRESHOLD", &raw))
                .transpose()?,
            notify,
            result_path: get("RESULT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULT_PATH)),
            submit_max_attempts: (submit_max_attempts > 0).then_some(submit_max_attempts),
            send_concurrency: get("SEND_CONCURRENCY")
                .map(|raw| parse("SEND_CONCURRENCY", &raw))
                .transpose()?
                .unwrap_or(DEFAULT_SEND_CONCURRENCY)
                .max(1),
            send_rate_per_second: DEFAULT_SEND_RATE_PER_SECOND,
            rpc_timeout: Duration::from_secs(
                get("RPC_TIMEOUT_SECONDS")
                    .map(|raw| parse("RPC_TIMEOUT_SECONDS", &raw))
                    .transpose()?
                    .unwrap_or(DEFAULT_RPC_TIMEOUT_SECONDS),
            ),
            programs,
        })
    }

    /// Pools whose funding period matches this invocation's period.
    pub fn pools_due(&self) -> Vec<&PoolConfig> {
        self.pools
            .iter()
            .filter(|pool| pool.funding_period_minutes == self.period_minutes)
            .collect()
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| FundingError::invalid_config(key, format!("{raw:?}: {e}")))
}

//! Entry point: one top-up run for the pools due this period.

use std::sync::Arc;

use anyhow::{Context, Result};
use reward_topup::config::{NotifyConfig, RunConfig};
use reward_topup::funding::{RpcLedgerGateway, SubmissionPolicy, SubmissionThrottle};
use reward_topup::notify::{Notifier, WebhookNotifier};
use reward_topup::runner::{RunnerSettings, TopUpRunner};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

const RUN_ERROR_TITLE: &str = "Error in ASR pools worker";

#[tokio::main]
async fn main() -> Result<()> {
    let config = RunConfig::from_env();

    // Initialize logging
    let debug_log = config.as_ref().map(|c| c.debug_log).unwrap_or(false);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug_log { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            let message = format!("Error: {e}");
            error!("{}", message);
            if let Ok(notifier) = WebhookNotifier::new(NotifyConfig::from_env()) {
                notifier.notify(RUN_ERROR_TITLE, &message).await;
            }
            return Err(e).context("failed to load configuration");
        }
    };

    let notifier: Arc<dyn Notifier> = Arc::new(
        WebhookNotifier::new(config.notify.clone()).context("failed to build webhook client")?,
    );

    let outcome = if config.dry_run {
        run(&config, notifier.clone()).instrument(info_span!("dry")).await
    } else {
        run(&config, notifier.clone()).await
    };

    if let Err(e) = &outcome {
        let message = format!("Error: {e:#}");
        error!("{}", message);
        notifier.notify(RUN_ERROR_TITLE, &message).await;
    }
    outcome
}

async fn run(config: &RunConfig, notifier: Arc<dyn Notifier>) -> Result<()> {
    info!("Top up ASR pools - {} pools configured", config.pools.len());

    let rpc = Arc::new(RpcClient::new_with_timeout_and_commitment(
        config.rpc_url.clone(),
        config.rpc_timeout,
        CommitmentConfig::confirmed(),
    ));
    let gateway = Arc::new(RpcLedgerGateway::new(rpc, config.programs));
    let throttle = Arc::new(
        SubmissionThrottle::new(config.send_concurrency).with_rate_limit(config.send_rate_per_second),
    );
    let policy = SubmissionPolicy {
        max_attempts: config.submit_max_attempts,
        dry_run: config.dry_run,
    };
    let settings = RunnerSettings {
        sol_balance_warning_threshold: config.sol_balance_warning_threshold,
        ..RunnerSettings::default()
    };

    let runner = TopUpRunner::new(gateway, config.programs, policy, throttle, notifier, settings);

    let pools = config.pools_due();
    info!(
        "Processing {} pools for period: {} minutes",
        pools.len(),
        config.period_minutes
    );
    let report = runner.run(&pools).await;
    info!(
        "Run finished: {} pools, {} failed",
        report.results.len(),
        report.failures()
    );

    if config.dry_run {
        report.log_rows();
        return Ok(());
    }

    report
        .write_csv(&config.result_path)
        .await
        .with_context(|| format!("failed to write {}", config.result_path.display()))
}

//! Submission of prepared transactions with expiry retries.

use std::sync::Arc;

use solana_sdk::signature::Signature;
use tracing::{debug, info, instrument, warn};

use crate::error::{FundingError, Result};
use crate::funding::consts::DEFAULT_SUBMIT_MAX_ATTEMPTS;
use crate::funding::gateway::{LedgerGateway, SendFailure};
use crate::funding::throttle::SubmissionThrottle;
use crate::funding::types::PreparedTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionPolicy {
    /// `None` retries expired submissions until one commits
    pub max_attempts: Option<u32>,
    /// Log the encoded transaction instead of sending it
    pub dry_run: bool,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_SUBMIT_MAX_ATTEMPTS),
            dry_run: false,
        }
    }
}

impl SubmissionPolicy {
    /// `0` means unbounded.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = (attempts > 0).then_some(attempts);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

pub struct SubmissionEngine {
    gateway: Arc<dyn LedgerGateway>,
    policy: SubmissionPolicy,
}

impl SubmissionEngine {
    pub fn new(gateway: Arc<dyn LedgerGateway>, policy: SubmissionPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> SubmissionPolicy {
        self.policy
    }

    /// Sends `prepared` until it commits.
    ///
    /// Expiry is retried with the same transaction; any other rejection is
    /// terminal. A throttle slot is held only while a send is in flight.
    /// Dry runs return `Ok(None)` without touching the ledger.
    #[instrument(skip(self, prepared, throttle), fields(signature = %prepared.signature()))]
    pub async fn submit(
        &self,
        prepared: &PreparedTransaction,
        throttle: &SubmissionThrottle,
    ) -> Result<Option<Signature>> {
        if self.policy.dry_run {
            info!("Transaction (base64): {}", prepared.to_base64()?);
            info!("Transfers: {}", prepared.summary());
            return Ok(None);
        }

        let mut attempts: u32 = 0;
        loop {
            if let Some(max) = self.policy.max_attempts {
                if attempts >= max {
                    return Err(FundingError::SubmissionTimedOut { attempts });
                }
            }
            attempts += 1;
            debug!("Submitting transaction, attempt {}", attempts);

            let outcome = {
                let _permit = throttle.acquire().await?;
                self.gateway
                    .send_transaction(&prepared.transaction, prepared.last_valid_block_height)
                    .await
            };

            match outcome {
                Ok(signature) => {
                    for item in prepared.items.iter() {
                        info!(
                            "Transferred {} of {} to {}, tx {}",
                            item.amount, item.mint, item.recipient, signature
                        );
                    }
                    return Ok(Some(signature));
                }
                Err(SendFailure::Expired) => {
                    warn!("Transaction expired on attempt {}, retrying", attempts);
                }
                Err(SendFailure::Rejected(reason)) => {
                    return Err(FundingError::SubmissionFailed(reason));
                }
            }
        }
    }
}

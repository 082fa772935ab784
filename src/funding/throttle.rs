//! Process-wide gate for ledger submissions.
//!
//! Bounds how many submissions are in flight at once and, optionally, how
//! fast new ones may start. Permits are RAII guards: dropping one on any
//! exit path frees the slot.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

use crate::error::{FundingError, Result};

pub struct SubmissionThrottle {
    slots: Arc<Semaphore>,
    concurrency: usize,
    /// Start-rate quota; `None` leaves only the concurrency bound
    pace: Option<DefaultDirectRateLimiter>,
}

/// Held for the duration of one submission attempt.
#[derive(Debug)]
pub struct ThrottlePermit {
    _slot: OwnedSemaphorePermit,
}

impl SubmissionThrottle {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            slots: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            pace: None,
        }
    }

    /// Limits how many submissions may start per second.
    pub fn with_rate_limit(mut self, starts_per_second: u32) -> Self {
        self.pace = NonZeroU32::new(starts_per_second)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        self
    }

    /// Waits for a free slot (and the pacing quota, when set).
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Result<ThrottlePermit> {
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FundingError::ThrottleClosed)?;

        if let Some(pace) = &self.pace {
            pace.until_ready().await;
        }

        debug!("Throttle slot acquired, {} in flight", self.in_flight());
        Ok(ThrottlePermit { _slot: slot })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn in_flight(&self) -> usize {
        self.concurrency - self.slots.available_permits()
    }

    /// Rejects all pending and future acquisitions.
    pub fn close(&self) {
        self.slots.close();
    }
}

impl Default for SubmissionThrottle {
    fn default() -> Self {
        Self::new(crate::funding::consts::DEFAULT_SEND_CONCURRENCY)
    }
}

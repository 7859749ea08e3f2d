//! Conflict retry policy
//!
//! Reader and executor share one retry discipline: an attempt that fails with
//! a serialization conflict is discarded and re-run from the beginning; any
//! other outcome ends the call.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::error::{StoreError, WalletError};

/// Default attempt cap
const DEFAULT_MAX_ATTEMPTS: u32 = 50;

/// Initial backoff in milliseconds (doubles each retry: 2, 4, 8, ... capped)
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 2;

const DEFAULT_MAX_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Retry forever with no pause between attempts.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Whether another attempt may start after `attempts` have run.
    pub fn allows_another(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }

    /// Deterministic part of the pause after the `attempt`-th conflict (1-based).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if self.initial_backoff.is_zero() {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1).min(20);
        let delay = self.initial_backoff.saturating_mul(1u32 << shift);
        delay.min(self.max_backoff)
    }

    /// Base delay plus up to 50% random jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if base.is_zero() {
            return base;
        }
        let jitter_cap = (base.as_micros() / 2) as u64;
        let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
        base + Duration::from_micros(jitter)
    }
}

/// Run `attempt` until it succeeds, fails terminally, or the policy runs out.
///
/// `attempt` receives the 1-based attempt number. Only
/// [`WalletError::Conflict`] re-enters the loop; when the cap is hit the last
/// conflict is reported as [`WalletError::ExhaustedRetries`].
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut attempt: F,
) -> Result<T, WalletError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, WalletError>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        let last: StoreError = match attempt(attempts).await {
            Err(WalletError::Conflict(e)) => e,
            other => return other,
        };

        if !policy.allows_another(attempts) {
            warn!(
                operation,
                attempts,
                error = %last,
                "Retry budget exhausted"
            );
            return Err(WalletError::ExhaustedRetries { attempts, last });
        }

        let delay = policy.delay(attempts);
        warn!(
            operation,
            attempt = attempts,
            delay_us = delay.as_micros() as u64,
            error = %last,
            "Serialization conflict, retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

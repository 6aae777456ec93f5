//! Delayed retry of the whole fetch-and-apply workflow.
//!
//! Only transient errors (see [`crate::error::Error::is_transient`]) are retried. The
//! command line uses a single retry after five minutes.
//!
//! With [`Backoff::Exponential`] the pause doubles after every retry:
//! 10s, 20s, 40s... for an initial delay of 10 seconds.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Pause before the single retry used by the command line.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(300);

/// How long to pause before each retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    #[cfg_attr(not(test), allow(dead_code))]
    Exponential { initial: Duration },
}

impl Backoff {
    /// Pause before retry number `retry`, counting from 1.
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { initial } => {
                // (1 << (retry - 1)) gives 1, 2, 4...
                let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff: Backoff::Fixed(DEFAULT_RETRY_DELAY),
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until it succeeds, fails permanently, or the retries
    /// are used up. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.backoff.delay_for(retry);
                    warn!("{e}");
                    warn!(
                        "Will try again in {} seconds ({retry}/{})",
                        delay.as_secs(),
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

//! Exponential-backoff connection attempts.
//!
//! Each attempt re-reads the descriptor (file sources may still be empty while
//! the controller boots) and asks the cache for a capability. Between failed
//! attempts the loop sleeps for the current delay, then grows it by half.

use std::sync::Arc;
use std::time::Duration;

use ctrlink_runtime::{Capability, DescriptorSource, Error, Result};
use tracing::{debug, info, warn};

use crate::cache::ConnectionCache;

/// Delay before the second attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(200);

/// Attempts made before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	pub initial_delay: Duration,
	pub max_attempts: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			initial_delay: DEFAULT_INITIAL_DELAY,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
		}
	}
}

impl RetryPolicy {
	pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
		Self {
			initial_delay,
			max_attempts,
		}
	}

	/// Wait after `failures` failed attempts: `initial_delay * 1.5^failures`.
	pub fn delay_for(&self, failures: u32) -> Duration {
		(0..failures).fold(self.initial_delay, |delay, _| grow(delay))
	}

	/// Sum of every wait a fully exhausted budget would spend.
	pub fn total_wait(&self) -> Duration {
		(0..self.max_attempts.saturating_sub(1)).map(|k| self.delay_for(k)).sum()
	}
}

/// Connects to the descriptor in `source`, retrying per `policy`.
///
/// The last attempt's error is returned as is; callers add context.
///
/// # Errors
///
/// Returns [`Error::RetryBudgetExhausted`] if `policy.max_attempts` is zero,
/// otherwise the error of the final attempt. Fatal errors (see
/// [`Error::is_fatal`]) end the loop immediately.
pub async fn connect_with_retry(
	cache: &ConnectionCache,
	source: &DescriptorSource,
	policy: &RetryPolicy,
) -> Result<Arc<dyn Capability>> {
	if policy.max_attempts == 0 {
		return Err(Error::RetryBudgetExhausted { max_attempts: 0 });
	}

	let mut delay = policy.initial_delay;
	let mut attempt: u32 = 0;
	loop {
		debug!(target = "ctrlink.retry", source = %source, attempt, max = policy.max_attempts, "connecting");
		match try_once(cache, source).await {
			Ok(capability) => {
				if attempt > 0 {
					info!(target = "ctrlink.retry", source = %source, attempts = attempt + 1, "connected after retry");
				}
				return Ok(capability);
			}
			Err(e) if e.is_fatal() => return Err(e),
			Err(e) if attempt + 1 >= policy.max_attempts => {
				warn!(target = "ctrlink.retry", source = %source, attempts = attempt + 1, "giving up: {e}");
				return Err(e);
			}
			Err(e) => {
				debug!(
					target = "ctrlink.retry",
					source = %source,
					attempt,
					delay_ms = delay.as_millis() as u64,
					"attempt failed: {e}"
				);
				tokio::time::sleep(delay).await;
				delay = grow(delay);
				attempt += 1;
			}
		}
	}
}

fn grow(delay: Duration) -> Duration {
	delay.saturating_mul(3) / 2
}

async fn try_once(cache: &ConnectionCache, source: &DescriptorSource) -> Result<Arc<dyn Capability>> {
	let descriptor = source.load()?;
	cache.get_capability(&descriptor).await
}

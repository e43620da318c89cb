use std::time::Duration;

use tracing::warn;

use crate::services::llm::LlmError;
use crate::services::profile::ModelProfile;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_retries: u32,
    pub base: u32,
    pub unit: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            base: 2,
            unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the attempt that follows the `retry_count`-th rate limit.
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.unit
            .saturating_mul(self.base.saturating_pow(retry_count))
            .min(self.max_delay)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("{0}")]
    Terminal(LlmError),
    #[error("rate limit exceeded after {attempts} retries")]
    Exhausted { attempts: u32 },
}

/// Calls `profile`, backing off exponentially while the service reports a
/// rate limit. Any other failure ends the call straight away.
pub async fn call_with_retry(
    profile: &ModelProfile,
    system_prompt: &str,
    instruction: &str,
    policy: &RetryPolicy,
) -> Result<String, CallError> {
    let attempts = policy.max_retries.max(1);
    let mut retry_count = 0;

    loop {
        let err = match profile.call(system_prompt, instruction).await {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };

        if !err.is_rate_limit() {
            return Err(CallError::Terminal(err));
        }

        retry_count += 1;
        if retry_count >= attempts {
            return Err(CallError::Exhausted { attempts });
        }

        let wait = policy.delay(retry_count);
        warn!(
            model = profile.name(),
            retry_count,
            wait_ms = wait.as_millis() as u64,
            "rate limit exceeded, backing off"
        );
        tokio::time::sleep(wait).await;
    }
}

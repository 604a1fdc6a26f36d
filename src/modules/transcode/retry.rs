use std::time::Duration;

/// Exponential backoff between transcode attempts. The delay after attempt
/// `n` is `initial_delay * 2^(n-1)`, capped at `max_delay`; no delay follows
/// the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << shift;
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

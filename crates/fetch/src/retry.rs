use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ErrorKind, Result};

/// Fixed-delay retry for transient failures.
///
/// `max_attempts == 0` retries forever. A remote host that keeps failing will
/// then stall the caller indefinitely; bounded policies surface
/// [`Exhausted`](ErrorKind::Exhausted) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}
impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self { max_attempts: 0, delay }
    }

    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Whether `attempt` (1-based) failures are all this policy allows.
    pub fn gives_up_after(&self, attempt: u32) -> bool {
        self.max_attempts != 0 && attempt >= self.max_attempts
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// policy gives up.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if self.gives_up_after(attempt) {
                return Err(err.raise(ErrorKind::Exhausted(attempt)));
            }
            warn!(what, attempt, error = %*err, "Request failed, retrying");
            tokio::time::sleep(self.delay).await;
        }
    }
}

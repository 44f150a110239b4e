use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{Result, SourceError};

/// One retry policy applied to every network call (§4.6), replacing the
/// three ad-hoc retry loops the corpus grew independently in P1, P2, and P3.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub mult: f64,
    pub jitter: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs_f64(1.0),
            mult: 2.0,
            jitter: 0.25,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `PER_URL_MAX_RETRIES`/`PER_URL_RETRY_DELAY_S` variant used by P3's
    /// waterfall, which retries each URL a small fixed number of times rather
    /// than backing off exponentially.
    pub fn per_url(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            mult: 1.0,
            jitter: 0.25,
            max_delay: delay,
        }
    }

    fn delay_for(&self, attempt: u32, retry_after_s: Option<u64>) -> Duration {
        if let Some(secs) = retry_after_s {
            return Duration::from_secs(secs);
        }
        let raw = self.base_delay.as_secs_f64() * self.mult.powi(attempt as i32);
        let jitter_frac = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        let with_jitter = (raw * (1.0 + jitter_frac)).max(0.0);
        Duration::from_secs_f64(with_jitter).min(self.max_delay)
    }

    /// Runs `f` under this policy. `f` receives the 0-indexed attempt number.
    /// Retries only on [`SourceError::is_retryable`] errors, up to
    /// `max_retries` attempts total.
    pub async fn retry<T, F, Fut>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    let retry_after_s = match &err {
                        SourceError::RateLimit { retry_after_s } => *retry_after_s,
                        _ => None,
                    };
                    let delay = self.delay_for(attempt, retry_after_s);
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_server_errors_up_to_max() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .retry(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SourceError::ServerError(503)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_client_errors() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .retry(|_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SourceError::ClientError(403)) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .retry(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(SourceError::Timeout)
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

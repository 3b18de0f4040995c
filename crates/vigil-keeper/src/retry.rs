use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::KeeperError;

/// Backoff before retry `attempt` with `jitter` in [0, 1] of the extra quarter.
///
///   delay = min(base * multiplier^attempt, max)
///   total = min(delay + jitter * delay / 4, max)
pub fn backoff_delay(policy: &RetryConfig, attempt: u32, jitter: f64) -> Duration {
    let delay = policy.delay_for_attempt(attempt);
    let extra = (delay as f64 / 4.0 * jitter.clamp(0.0, 1.0)) as u64;
    Duration::from_millis(delay.saturating_add(extra).min(policy.max_delay_ms))
}

fn jittered_delay(policy: &RetryConfig, attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0.0..=1.0);
    backoff_delay(policy, attempt, jitter)
}

/// Run `op` until it succeeds, up to `policy.max_attempts` times. Each attempt
/// is bounded by `policy.timeout_ms`; failures back off exponentially with jitter.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryConfig,
    label: &str,
    mut op: F,
) -> Result<T, KeeperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match tokio::time::timeout(policy.timeout(), op()).await {
            Ok(Ok(value)) => {
                if attempt > 0 {
                    tracing::debug!(label, attempt = attempt + 1, "succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = format!("timed out after {}ms", policy.timeout_ms),
        }

        if attempt + 1 < attempts {
            let delay = jittered_delay(policy, attempt);
            tracing::warn!(
                label,
                attempt = attempt + 1,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(KeeperError::TransientProvider {
        label: label.to_string(),
        attempts,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn policy() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            timeout_ms: 50,
        }
    }

    #[test]
    fn test_backoff_delay_bounds() {
        let p = policy();
        assert_eq!(backoff_delay(&p, 0, 0.0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&p, 0, 1.0), Duration::from_millis(125));
        assert_eq!(backoff_delay(&p, 1, 0.5), Duration::from_millis(225));
        // jitter never pushes past the cap
        assert_eq!(backoff_delay(&p, 3, 1.0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(&p, 30, 1.0), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let c = calls.clone();
        let result = with_retry(&policy(), "flaky", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("connection reset")
                } else {
                    Ok(42u64)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100..=125ms then 200..=250ms of backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(375), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = with_retry(&policy(), "down", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("503 service unavailable") }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            KeeperError::TransientProvider { label, attempts, reason } => {
                assert_eq!(label, "down");
                assert_eq!(attempts, 3);
                assert_eq!(reason, "503 service unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_is_timed_out() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = with_retry(&policy(), "slow", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, String>(())
            }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("timed out after 50ms"));
    }
}

//! Retry policy applied uniformly to every fetch the controller makes

use std::{fmt, future::Future, sync::Arc, time::Duration};

use color_eyre::eyre::{Report, Result};
use tracing::debug;
use tracing_error::SpanTrace;

use crate::model::SharedError;

/// Decides whether a failure should be retried; receives the attempt number
/// the retry would be (1 for the first retry)
pub type RetryIf = Arc<dyn Fn(&Report, u32) -> bool + Send + Sync>;
/// Delay before a given retry attempt
pub type RetryDelayBuilder = Arc<dyn Fn(u32) -> Duration + Send + Sync>;
/// Called before each retry with the attempt number, the error and the delay
pub type OnRetry = Arc<dyn Fn(u32, &Report, Duration) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
    retry_if: Option<RetryIf>,
    retry_delay_builder: Option<RetryDelayBuilder>,
    on_retry: Option<OnRetry>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("retry_if", &self.retry_if.is_some())
            .field("retry_delay_builder", &self.retry_delay_builder.is_some())
            .finish()
    }
}

/// A fetch that failed for good, after any retries
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub error: SharedError,
    pub stack_trace: Arc<SpanTrace>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            ..Self::default()
        }
    }

    pub fn with_limits(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_retry_if(
        mut self,
        retry_if: impl Fn(&Report, u32) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_if = Some(Arc::new(retry_if));
        self
    }

    pub fn with_delay_builder(
        mut self,
        builder: impl Fn(u32) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.retry_delay_builder = Some(Arc::new(builder));
        self
    }

    pub fn with_on_retry(
        mut self,
        on_retry: impl Fn(u32, &Report, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay_builder
            .as_ref()
            .map_or(self.retry_delay, |builder| builder(attempt))
    }

    fn should_retry(&self, error: &Report, attempt: u32) -> bool {
        self.retry_if
            .as_ref()
            .is_none_or(|retry_if| retry_if(error, attempt))
    }

    /// Run `attempt` until it succeeds or the policy gives up
    ///
    /// `abandoned` is checked after every failure and again after each retry
    /// delay; once it reports true no further attempt is made, so a disposed
    /// or cleared controller stops retrying.
    pub async fn run<T, F, Fut>(
        &self,
        mut attempt: F,
        abandoned: impl Fn() -> bool,
    ) -> std::result::Result<T, FetchFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tries = 0;
        loop {
            let error = match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            let next = tries + 1;

            if tries >= self.max_retries || abandoned() || !self.should_retry(&error, next) {
                return Err(FetchFailure {
                    error: Arc::new(error),
                    stack_trace: Arc::new(SpanTrace::capture()),
                    attempts: next,
                });
            }

            let delay = self.delay_for(next);
            debug!("Retrying fetch (attempt {next}/{}) in {delay:?}: {error}", self.max_retries);
            if let Some(on_retry) = &self.on_retry {
                on_retry(next, &error, delay);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if abandoned() {
                debug!("Fetch abandoned during retry delay");
                return Err(FetchFailure {
                    error: Arc::new(error),
                    stack_trace: Arc::new(SpanTrace::capture()),
                    attempts: next,
                });
            }
            tries = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use color_eyre::eyre::eyre;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rstest::*;

    use super::*;

    fn failing(calls: &Arc<AtomicU32>) -> impl FnMut() -> futures::future::Ready<Result<()>> {
        let calls = Arc::clone(calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Err(eyre!("failure #{n}")))
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 2)]
    #[case(2, 3)]
    #[tokio::test]
    async fn test_attempt_count(#[case] max_retries: u32, #[case] expected: u32) {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(max_retries, Duration::ZERO);

        let failure = policy
            .run(failing(&calls), || false)
            .await
            .expect_err("always fails");

        assert_eq!(calls.load(Ordering::SeqCst), expected);
        assert_eq!(failure.attempts, expected);
        assert_eq!(failure.error.to_string(), format!("failure #{}", expected - 1));
    }

    #[tokio::test]
    async fn test_succeeds_after_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let counter = Arc::clone(&calls);
        let value = policy
            .run(
                move || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    futures::future::ready(if n < 2 { Err(eyre!("flaky")) } else { Ok(n) })
                },
                || false,
            )
            .await;

        assert_eq!(value.ok(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_if_stops_early() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy =
            RetryPolicy::new(5, Duration::ZERO).with_retry_if(|_, attempt| attempt < 2);

        let failure = policy.run(failing(&calls), || false).await.expect_err("fails");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(failure.attempts, 2);
    }

    #[tokio::test]
    async fn test_abandoned_stops_retrying() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let _ = policy.run(failing(&calls), || true).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_during_delay_skips_next_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        // gives up once the first delay has started
        let failure = policy
            .run(failing(&calls), || {
                start.elapsed() >= Duration::from_millis(500)
            })
            .await
            .expect_err("abandoned");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.error.to_string(), "failure #0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_builder_and_on_retry_hook() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = Arc::clone(&seen);
        let policy = RetryPolicy::new(2, Duration::from_secs(60))
            .with_delay_builder(|attempt| Duration::from_millis(100 * u64::from(attempt)))
            .with_on_retry(move |attempt, error, delay| {
                hook_seen.lock().push((attempt, error.to_string(), delay));
            });

        let start = tokio::time::Instant::now();
        let _ = policy.run(failing(&calls), || false).await;

        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(
            *seen.lock(),
            vec![
                (1, "failure #0".to_string(), Duration::from_millis(100)),
                (2, "failure #1".to_string(), Duration::from_millis(200)),
            ]
        );
    }

    #[test]
    fn test_flat_delay_without_builder() {
        let policy = RetryPolicy::new(1, Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(7), Duration::from_millis(250));
    }
}

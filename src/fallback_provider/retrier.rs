//! Exponential backoff retries for a single endpoint.

use std::{future::Future, time::Duration};

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;

/// Outcome of [`Retrier::retry_until_cancelled`] when the operation did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The cancellation token fired before the operation succeeded.
    Cancelled,
    /// Every attempt failed; holds the error of the last attempt.
    Exhausted(E),
}

/// Runs an operation, retrying failures with exponential backoff.
///
/// The first delay equals `min_backoff` and every following delay doubles, capped at
/// `max_backoff`. With `max_retries = R` the operation runs at most `R + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct Retrier {
    max_retries: usize,
    min_backoff: Duration,
    max_backoff: Duration,
    log_retries: bool,
}

impl Retrier {
    /// Creates a retrier. `max_backoff` is raised to `min_backoff` if it is smaller.
    #[must_use]
    pub fn new(
        max_retries: usize,
        min_backoff: Duration,
        max_backoff: Duration,
        log_retries: bool,
    ) -> Self {
        Self { max_retries, min_backoff, max_backoff: max_backoff.max(min_backoff), log_retries }
    }

    /// Maximum number of retries after the first failed attempt.
    #[must_use]
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// The delays slept between consecutive attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        self.strategy().build()
    }

    /// Executes `operation` until it succeeds or the retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt, unchanged, once all attempts have failed.
    pub async fn retry<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let log_retries = self.log_retries;
        let mut attempt = 0_usize;

        operation
            .retry(self.strategy())
            .sleep(tokio::time::sleep)
            .notify(|err: &E, backoff: Duration| {
                attempt += 1;
                if log_retries {
                    warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis(),
                        error = %err,
                        "Request failed, retrying after backoff"
                    );
                }
                // ignore unused var warnings when tracing disabled
                _ = (attempt, err, backoff);
            })
            .await
    }

    /// Like [`Retrier::retry`], but stops as soon as `token` is cancelled.
    ///
    /// Cancellation interrupts both an in-flight attempt and a pending backoff sleep.
    ///
    /// # Errors
    ///
    /// * [`RetryError::Cancelled`] - if `token` was cancelled before the operation succeeded.
    /// * [`RetryError::Exhausted`] - with the last error, once all attempts have failed.
    pub async fn retry_until_cancelled<T, E, F, Fut>(
        &self,
        operation: F,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!("Retry loop cancelled");
                Err(RetryError::Cancelled)
            }
            result = self.retry(operation) => result.map_err(RetryError::Exhausted),
        }
    }

    fn strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_delay(self.max_backoff)
            .with_max_times(self.max_retries)
    }
}

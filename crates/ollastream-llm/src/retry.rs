//! Retry wrapper for streaming operations
//!
//! Lives outside the provider: the provider only classifies and propagates
//! errors, and this wrapper decides whether to run the whole operation again.

use crate::provider::{ErrorKind, LlmError, LlmResult, LlmStream};
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
            randomization_factor: 0.5,
            retry_on: ErrorKind::ALL.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor;
        self
    }

    pub fn with_retry_on(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn should_retry(&self, err: &LlmError) -> bool {
        self.retry_on.contains(&err.kind())
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.randomization_factor)
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Run `operation` under `policy`, returning one continuous event stream.
///
/// A failure is retried only while no event has reached the caller; after
/// that it is yielded as-is, since replaying would duplicate output.
pub fn with_retry<F, Fut>(policy: RetryPolicy, operation: F) -> LlmStream
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = LlmResult<LlmStream>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut backoff = policy.backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut delivered = false;

            let failure = match operation().await {
                Ok(mut stream) => {
                    let mut failure = None;
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(event) => {
                                delivered = true;
                                yield Ok(event);
                            }
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                    match failure {
                        Some(e) => e,
                        None => break,
                    }
                }
                Err(e) => e,
            };

            if delivered || attempt >= policy.max_attempts || !policy.should_retry(&failure) {
                yield Err(failure);
                break;
            }

            match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        "attempt {}/{} failed, retrying in {:?}: {}",
                        attempt, policy.max_attempts, delay, failure
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    yield Err(failure);
                    break;
                }
            }
        }
    })
}

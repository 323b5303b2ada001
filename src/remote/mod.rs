//! # Rate limited remote calls
//!
//! Every remote dependency (listening history, metadata graph, downstream
//! music manager) is reached through a [`RemoteClient`]. A client owns two
//! things:
//!
//! - a "time of last call" marker. A call issued sooner than the configured
//!   minimum interval after the previous one sleeps until the interval has
//!   passed; it is never rejected.
//! - a [`RetryPolicy`] plus a [`Classifier`] deciding, per failed attempt,
//!   whether to retry and how long to wait. Each service supplies its own
//!   classifier, so the same engine serves fixed, linear and exponential
//!   backoff schedules and service specific rate limit signals.
//!
//! Once the attempts are exhausted the last [`RemoteError`] is returned to
//! the caller, which decides whether that failure is silent ("unknown"
//! metadata) or counted (downstream service operations).
//!
//! Calls are strictly sequential, the marker is only ever touched by one
//! caller at a time.

use std::{future::Future, time::Duration};

use reqwest::{Response, StatusCode, header::HeaderMap};
use serde::de::DeserializeOwned;
use tokio::{sync::Mutex, time::{Instant, sleep}};

use crate::{debug, error::RemoteError, warning};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base_delay` between every attempt.
    Fixed,
    /// `base_delay × attempt`.
    Linear,
    /// `base_delay × 2^attempt`.
    Exponential,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry(Backoff),
    /// Explicit rate limit signal with an optional server supplied wait hint.
    RateLimited(Option<Duration>),
    Fail,
}

/// Maps a failed attempt to a [`Disposition`].
pub type Classifier = fn(&RemoteError) -> Disposition;

/// Retries transient failures with a fixed delay and honours rate limit hints.
pub fn default_classifier(err: &RemoteError) -> Disposition {
    match err {
        RemoteError::Status { status: 429, retry_after } => Disposition::RateLimited(*retry_after),
        RemoteError::Api { code: 29, .. } => Disposition::RateLimited(None),
        e if e.is_transient() => Disposition::Retry(Backoff::Fixed),
        _ => Disposition::Fail,
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(120),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the next attempt, `attempt` being the 1-based number of
    /// the attempt that just failed. Never exceeds `max_delay`.
    pub fn delay(&self, backoff: Backoff, attempt: u32) -> Duration {
        let delay = match backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt.min(16))),
        };
        delay.min(self.max_delay)
    }

    /// Wait for an explicit rate limit signal. `None` when the server asks
    /// for more than `max_delay`, in which case the call gives up.
    pub fn rate_limit_delay(&self, hint: Option<Duration>) -> Option<Duration> {
        let wait = hint.unwrap_or_else(|| self.base_delay.saturating_mul(2));
        (wait <= self.max_delay).then_some(wait)
    }
}

pub struct RemoteClient {
    name: String,
    min_interval: Duration,
    policy: RetryPolicy,
    classify: Classifier,
    last_call: Mutex<Option<Instant>>,
}

impl RemoteClient {
    pub fn new(name: &str, min_interval: Duration, policy: RetryPolicy) -> Self {
        Self {
            name: name.to_string(),
            min_interval,
            policy,
            classify: default_classifier,
            last_call: Mutex::new(None),
        }
    }

    pub fn with_classifier(mut self, classify: Classifier) -> Self {
        self.classify = classify;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` with throttling and retries.
    ///
    /// `operation` is only used for log output.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max = self.policy.max_attempts;
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.throttle(operation).await;

            debug!("{} → {} (attempt {}/{})", self.name, operation, attempt, max);
            let result = op().await;
            *self.last_call.lock().await = Some(Instant::now());

            let err = match result {
                Ok(value) => {
                    debug!("{} ← {} ok", self.name, operation);
                    return Ok(value);
                }
                Err(err) => err,
            };
            debug!("{} ← {} failed: {}", self.name, operation, err);

            if attempt >= max {
                return Err(err);
            }

            let wait = match (self.classify)(&err) {
                Disposition::Fail => return Err(err),
                Disposition::Retry(backoff) => self.policy.delay(backoff, attempt),
                Disposition::RateLimited(hint) => match self.policy.rate_limit_delay(hint) {
                    Some(wait) => wait,
                    None => {
                        warning!(
                            "{} asked to wait an abnormally long time before retrying {}, giving up.",
                            self.name,
                            operation
                        );
                        return Err(err);
                    }
                },
            };

            warning!(
                "{} {} failed ({}), retrying in {:.1}s ({}/{})",
                self.name,
                operation,
                err,
                wait.as_secs_f64(),
                attempt,
                max
            );
            sleep(wait).await;
        }
    }

    async fn throttle(&self, operation: &str) {
        let last = *self.last_call.lock().await;
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(
                    "{} sleep {:.2}s before {}",
                    self.name,
                    wait.as_secs_f64(),
                    operation
                );
                sleep(wait).await;
            }
        }
    }
}

/// Reads the `Retry-After` header as whole seconds.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Maps a non-success status to a [`RemoteError`], passes successes through.
pub fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound);
    }
    Err(RemoteError::Status {
        status: status.as_u16(),
        retry_after: retry_after(response.headers()),
    })
}

/// Checks the status and decodes a JSON body.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let response = check_status(response)?;
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

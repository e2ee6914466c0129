//! Convergence poller
//!
//! Repeatedly evaluates a predicate over live state until it holds or a
//! deadline passes. One poller covers both calling styles: check first and
//! then wait (`immediate = true`, used for node readiness), or wait first and
//! then check (`immediate = false`, used after deleting a resource so the
//! controller has a moment to react).
//!
//! The poller never logs and never inspects error kinds. A predicate reports
//! failures as [`PredicateError`], tagged retryable or fatal by the caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ProbeError, Result};

/// Interval and timeout for one poll. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    timeout: Duration,
}

impl PollPolicy {
    /// Build a policy. The interval must be non-zero; a zero timeout is
    /// allowed and means "check once".
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ProbeError::InvalidPolicy(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self { interval, timeout })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// A failure reported by a predicate.
#[derive(Debug)]
pub struct PredicateError {
    retryable: bool,
    source: anyhow::Error,
}

impl PredicateError {
    /// Not converged yet, keep polling (e.g. the resource does not exist yet).
    pub fn retryable(source: impl Into<anyhow::Error>) -> Self {
        Self {
            retryable: true,
            source: source.into(),
        }
    }

    /// Abort the poll immediately.
    pub fn fatal(source: impl Into<anyhow::Error>) -> Self {
        Self {
            retryable: false,
            source: source.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn source(&self) -> &anyhow::Error {
        &self.source
    }

    pub fn into_source(self) -> anyhow::Error {
        self.source
    }
}

impl std::fmt::Display for PredicateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

/// How a poll ended.
#[derive(Debug)]
pub enum ConvergenceOutcome {
    /// The predicate returned true.
    Converged { attempts: u32, elapsed: Duration },
    /// The deadline passed first. Carries the last retryable error, if the
    /// final evaluations failed rather than returned false.
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        last_error: Option<PredicateError>,
    },
    /// The predicate failed with a non-retryable error.
    PredicateError {
        attempts: u32,
        elapsed: Duration,
        error: PredicateError,
    },
}

impl ConvergenceOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceOutcome::Converged { .. })
    }

    /// Number of predicate evaluations.
    pub fn attempts(&self) -> u32 {
        match self {
            ConvergenceOutcome::Converged { attempts, .. }
            | ConvergenceOutcome::TimedOut { attempts, .. }
            | ConvergenceOutcome::PredicateError { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            ConvergenceOutcome::Converged { elapsed, .. }
            | ConvergenceOutcome::TimedOut { elapsed, .. }
            | ConvergenceOutcome::PredicateError { elapsed, .. } => *elapsed,
        }
    }

    /// Convert into a `Result`, naming `resource` in the error.
    pub fn into_result(self, resource: &str) -> Result<()> {
        match self {
            ConvergenceOutcome::Converged { .. } => Ok(()),
            ConvergenceOutcome::TimedOut {
                elapsed,
                last_error,
                ..
            } => Err(ProbeError::Timeout {
                resource: resource.to_string(),
                elapsed,
                last_error: last_error.map(|e| e.to_string()),
            }),
            ConvergenceOutcome::PredicateError { error, .. } => Err(ProbeError::Predicate {
                resource: resource.to_string(),
                source: error.into_source(),
            }),
        }
    }
}

/// Poll `predicate` under `policy` until it returns `Ok(true)`.
///
/// - `immediate = true`: evaluate before the first wait.
/// - `immediate = false`: wait one interval before the first evaluation.
///
/// Every wait is clamped to the time left before the deadline, and the
/// deadline is checked after every evaluation, so a never-true predicate
/// times out with `timeout <= elapsed < timeout + interval`.
pub async fn poll_until<F, Fut>(
    policy: &PollPolicy,
    immediate: bool,
    mut predicate: F,
) -> ConvergenceOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<bool, PredicateError>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut attempts = 0u32;
    let mut last_error = None;

    if !immediate {
        sleep_until_next(policy.interval, deadline).await;
    }

    loop {
        attempts += 1;
        match predicate().await {
            Ok(true) => {
                return ConvergenceOutcome::Converged {
                    attempts,
                    elapsed: start.elapsed(),
                }
            }
            Ok(false) => last_error = None,
            Err(e) if e.is_retryable() => last_error = Some(e),
            Err(error) => {
                return ConvergenceOutcome::PredicateError {
                    attempts,
                    elapsed: start.elapsed(),
                    error,
                }
            }
        }

        if Instant::now() >= deadline {
            return ConvergenceOutcome::TimedOut {
                attempts,
                elapsed: start.elapsed(),
                last_error,
            };
        }

        sleep_until_next(policy.interval, deadline).await;
    }
}

async fn sleep_until_next(interval: Duration, deadline: Instant) {
    let wake = (Instant::now() + interval).min(deadline);
    tokio::time::sleep_until(wake).await;
}

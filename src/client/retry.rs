//! Retry executor with pluggable backoff.
//!
//! [`execute`] runs a single-attempt closure until it produces an outcome that
//! should not be retried, the retry budget is spent, or the caller cancels.
//! Cancellation is checked before and after every attempt and races the backoff
//! sleep, so a cancelled request returns [`Outcome::Aborted`] promptly and never
//! a stale response from an earlier attempt.
//!
//! # Examples
//!
//! ```
//! use apiclient_http::client::{execute, Backoff, RetryPolicy};
//! use apiclient_http::types::Outcome;
//! use apiclient_http::CancelSignal;
//! use http::{HeaderMap, StatusCode};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy {
//!     max_retries: 2,
//!     backoff: Backoff::Fixed(Duration::from_millis(1)),
//!     ..RetryPolicy::default()
//! };
//!
//! let outcome: Outcome<()> = execute(&policy, &CancelSignal::new(), |attempt| async move {
//!     let status = if attempt < 2 { StatusCode::BAD_GATEWAY } else { StatusCode::OK };
//!     Outcome::Success { status, headers: HeaderMap::new() }
//! })
//! .await;
//!
//! assert_eq!(outcome.status(), Some(StatusCode::OK));
//! # });
//! ```

use crate::cancel::CancelSignal;
use crate::client::config::DEFAULT_RETRY_STATUSES;
use crate::client::utils::exponential_backoff;
use crate::types::{Outcome, ResponseKind};
use http::StatusCode;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Decides whether an attempt is retried, given its tag and status.
pub type RetryPredicate = Arc<dyn Fn(ResponseKind, Option<StatusCode>) -> bool + Send + Sync>;

/// Delay schedule between attempts.
#[derive(Clone)]
pub enum Backoff {
    /// Retry immediately
    None,
    /// Constant delay
    Fixed(Duration),
    /// `base * 2^attempt`, capped at `max`
    Exponential {
        /// First delay
        base: Duration,
        /// Cap
        max: Duration,
    },
    /// Random delay between `base` and three times the previous delay, capped at `max`
    DecorrelatedJitter {
        /// Lower bound and first upper bound
        base: Duration,
        /// Cap
        max: Duration,
    },
    /// Caller-supplied delay per attempt index
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::None => f.write_str("None"),
            Backoff::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Backoff::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            Backoff::DecorrelatedJitter { base, max } => f
                .debug_struct("DecorrelatedJitter")
                .field("base", base)
                .field("max", max)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Stateful delay generator for one logical request.
pub struct BackoffSchedule {
    backoff: Backoff,
    rng: StdRng,
    previous: Duration,
}

impl BackoffSchedule {
    /// Start a schedule. A seed makes jittered delays reproducible.
    pub fn new(backoff: Backoff, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let previous = match &backoff {
            Backoff::DecorrelatedJitter { base, .. } => *base,
            _ => Duration::ZERO,
        };
        BackoffSchedule {
            backoff,
            rng,
            previous,
        }
    }

    /// Delay after the failed attempt with index `attempt` (0-based).
    pub fn next_delay(&mut self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base, max } => {
                exponential_backoff(attempt, base.as_millis() as u64).min(*max)
            }
            Backoff::DecorrelatedJitter { base, max } => {
                let low = base.as_millis() as u64;
                let high = (self.previous.as_millis() as u64).saturating_mul(3);
                let picked = if high > low {
                    self.rng.gen_range(low..=high)
                } else {
                    low
                };
                let delay = Duration::from_millis(picked).min(*max);
                self.previous = delay;
                delay
            }
            Backoff::Custom(f) => f(attempt),
        }
    }
}

/// Declarative retry configuration.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay schedule
    pub backoff: Backoff,
    /// Statuses treated as transient by the default predicate
    pub retry_statuses: Vec<u16>,
    /// Replaces the default predicate. `Aborted` is never retried either way.
    pub predicate: Option<RetryPredicate>,
    /// Seed for jittered schedules
    pub jitter_seed: Option<u64>,
    /// Log each retry at warn level
    pub log_retries: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(1000),
                max: Duration::from_secs(30),
            },
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            predicate: None,
            jitter_seed: None,
            log_retries: true,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("retry_statuses", &self.retry_statuses)
            .field("custom_predicate", &self.predicate.is_some())
            .field("jitter_seed", &self.jitter_seed)
            .finish()
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            backoff: Backoff::None,
            ..RetryPolicy::default()
        }
    }

    /// Replace the default predicate.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(ResponseKind, Option<StatusCode>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Fresh delay schedule for one logical request.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule::new(self.backoff.clone(), self.jitter_seed)
    }

    /// Whether `outcome` is worth another attempt.
    pub fn should_retry<T, E>(&self, outcome: &Outcome<T, E>) -> bool {
        let kind = outcome.kind();
        if kind == ResponseKind::Aborted {
            return false;
        }
        if let Some(predicate) = &self.predicate {
            return predicate(kind, outcome.status());
        }
        match kind {
            ResponseKind::Timeout | ResponseKind::NetworkFailure => true,
            ResponseKind::ParsingFailure | ResponseKind::Aborted => false,
            _ => outcome
                .status()
                .is_some_and(|s| self.retry_statuses.contains(&s.as_u16())),
        }
    }
}

/// Run `attempt_fn` under `policy`.
///
/// `attempt_fn` receives the 0-based attempt index and must build a fresh
/// request for each call.
pub async fn execute<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancelSignal,
    mut attempt_fn: F,
) -> Outcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Outcome<T, E>>,
{
    let mut schedule = policy.schedule();
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Outcome::Aborted;
        }

        let outcome = attempt_fn(attempt).await;

        if cancel.is_cancelled() {
            return Outcome::Aborted;
        }
        if attempt >= policy.max_retries || !policy.should_retry(&outcome) {
            return outcome;
        }

        let delay = schedule.next_delay(attempt);
        if policy.log_retries {
            tracing::warn!(
                "Request failed (attempt {}, {}), retrying after {:?}",
                attempt + 1,
                describe(&outcome),
                delay
            );
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Aborted,
            _ = sleep(delay) => {}
        }
        attempt += 1;
    }
}

fn describe<T, E>(outcome: &Outcome<T, E>) -> String {
    match (outcome.status(), outcome.reason()) {
        (Some(status), _) => format!("{} {}", outcome.kind(), status),
        (None, Some(reason)) => format!("{}: {}", outcome.kind(), reason),
        (None, None) => outcome.kind().to_string(),
    }
}

//! Per-symbol history fetch with variant fallback and bounded retry.
//!
//! Two axes compose: within one attempt every variant of the class's chain
//! is tried in order; when the whole chain fails that attempt is spent, the
//! fetcher backs off and starts the next attempt from the first variant.
//! A symbol fails permanently only after the last variant of the last
//! attempt. Non-retryable errors (tripped circuit breaker) end it at once.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;

use super::provider::{DataError, HistoryProvider};
use crate::domain::{DateRange, InstrumentClass, PriceSeries, QueryVariant};

/// Bounded retry schedule for one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Full passes over the variant chain (at least 1).
    pub max_attempts: u32,
    /// Backoff before attempt 2; doubles for each later attempt.
    pub base_delay: Duration,
    /// Cap on any single backoff.
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each backoff.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Backoff before `attempt` (1-based); zero for the first attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);
        if self.jitter {
            let quarter = delay.as_millis() as u64 / 4;
            delay + Duration::from_millis(rand::thread_rng().gen_range(0..=quarter))
        } else {
            delay
        }
    }
}

/// A successful fetch and how it was obtained.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub series: PriceSeries,
    /// 1-based attempt that succeeded.
    pub attempts: u32,
    pub variant: QueryVariant,
}

/// Permanent failure for one symbol.
#[derive(Debug, Clone, Error)]
#[error("fetch failed for '{code}' after {attempts} attempt(s): {cause}")]
pub struct FetchFailure {
    pub code: String,
    pub attempts: u32,
    pub cause: DataError,
}

/// Position in the retry grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FetchState {
    attempt: u32,
    variant_idx: usize,
}

impl FetchState {
    const START: FetchState = FetchState {
        attempt: 1,
        variant_idx: 0,
    };

    /// Next cell after a retryable failure, or `None` when exhausted.
    fn advance(self, chain_len: usize, max_attempts: u32) -> Option<FetchState> {
        if self.variant_idx + 1 < chain_len {
            Some(FetchState {
                variant_idx: self.variant_idx + 1,
                ..self
            })
        } else if self.attempt < max_attempts {
            Some(FetchState {
                attempt: self.attempt + 1,
                variant_idx: 0,
            })
        } else {
            None
        }
    }
}

pub struct SeriesFetcher<'a> {
    provider: &'a dyn HistoryProvider,
    policy: RetryPolicy,
}

impl<'a> SeriesFetcher<'a> {
    /// Fetcher over `provider` with the given retry schedule.
    pub fn new(provider: &'a dyn HistoryProvider, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    /// The retry schedule in use.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Walk the variant chain for `class`, retrying whole passes until one
    /// query succeeds or the attempt budget is spent.
    pub fn fetch(
        &self,
        code: &str,
        class: InstrumentClass,
        range: &DateRange,
    ) -> Result<FetchOutcome, FetchFailure> {
        let chain = QueryVariant::chain(class);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = FetchState::START;

        loop {
            let variant = chain[state.variant_idx];
            let cause = match self.provider.query_history(code, variant, range) {
                Ok(series) => {
                    if state != FetchState::START {
                        log::debug!(
                            "{code}: fetched via {variant} on attempt {}",
                            state.attempt
                        );
                    }
                    return Ok(FetchOutcome {
                        series,
                        attempts: state.attempt,
                        variant,
                    });
                }
                Err(e) => e,
            };

            if !cause.is_retryable() {
                return Err(FetchFailure {
                    code: code.to_string(),
                    attempts: state.attempt,
                    cause,
                });
            }

            log::debug!(
                "{code}: {variant} failed on attempt {}/{max_attempts}: {cause}",
                state.attempt
            );

            let Some(next) = state.advance(chain.len(), max_attempts) else {
                return Err(FetchFailure {
                    code: code.to_string(),
                    attempts: state.attempt,
                    cause,
                });
            };

            if next.attempt != state.attempt {
                let mut delay = self.policy.delay_before(next.attempt);
                if let DataError::RateLimited { retry_after_secs } = cause {
                    let hinted = Duration::from_secs(retry_after_secs).min(self.policy.max_delay);
                    delay = delay.max(hinted);
                }
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
            state = next;
        }
    }
}

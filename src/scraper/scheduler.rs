//! Rate-limited scheduler for all outbound source calls
//!
//! This module handles:
//! - A random pause before every request, drawn from `[min-delay, max-delay]`
//! - Classification of transport results into payloads or `SourceError`s
//! - Exponential backoff for retryable failures, extended on HTTP 429
//! - A typed `Outcome` so callers branch on results instead of catching errors

use crate::config::SchedulerConfig;
use crate::source::{SourceRequest, SourceResponse, Transport, TransportError};
use crate::SourceError;
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Result of a scheduled call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The source answered with a usable JSON body
    Success(Value),

    /// The call failed for good: either a non-retryable error on the first
    /// attempt or a retryable one on every attempt
    Exhausted { attempts: u32, last_error: SourceError },
}

impl Outcome {
    pub fn into_result(self) -> Result<Value, SourceError> {
        match self {
            Self::Success(body) => Ok(body),
            Self::Exhausted { last_error, .. } => Err(last_error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub requests: u64,
    pub retries: u64,
    pub rate_limited: u64,
    pub exhausted: u64,
}

/// Gates every outbound call through pacing and retry policy
///
/// There is one scheduler per run and calls go through it one at a time,
/// which is what keeps the request rate polite.
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config,
            stats: SchedulerStats::default(),
        }
    }

    /// Executes a request, retrying retryable failures with backoff
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx with JSON body | Success |
    /// | HTTP 404 / 410 | Immediate → NotFound |
    /// | Other 4xx (except 403, 408, 429) | Immediate → Rejected |
    /// | HTTP 429 | Retry, backoff × rate-limit-multiplier |
    /// | HTTP 403 / 408 / 5xx | Retry, exponential backoff |
    /// | Timeout, connect error, non-JSON body | Retry, exponential backoff |
    ///
    /// Never more than `max-attempts` requests are made for one call.
    pub async fn execute(&mut self, request: &SourceRequest) -> Outcome {
        let url = request.full_url().to_string();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let pause = self.pacing_delay();
            if !pause.is_zero() {
                tracing::trace!("Pausing {:?} before {}", pause, url);
                tokio::time::sleep(pause).await;
            }

            tracing::debug!("Requesting {} (attempt {})", url, attempt);
            self.stats.requests += 1;
            let result = self.transport.call(request).await;

            let error = match classify_response(&url, result) {
                Ok(body) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", url, attempt);
                    }
                    return Outcome::Success(body);
                }
                Err(e) => e,
            };

            if error.is_rate_limit() {
                self.stats.rate_limited += 1;
            }

            if !error.is_retryable() {
                tracing::debug!("{} failed with non-retryable error: {}", url, error);
                self.stats.exhausted += 1;
                return Outcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }

            if attempt >= self.config.max_attempts {
                tracing::warn!(
                    "{} failed on final attempt {} ({}), giving up",
                    url,
                    attempt,
                    error
                );
                self.stats.exhausted += 1;
                return Outcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }

            let delay = self.backoff_delay(attempt, error.is_rate_limit());
            tracing::warn!(
                "{} failed on attempt {} ({}), retrying in {:?}",
                url,
                attempt,
                error,
                delay
            );
            self.stats.retries += 1;
            tokio::time::sleep(delay).await;
        }
    }

    /// Backoff after `failed_attempts` consecutive failures
    ///
    /// `base * 2^(n-1)`, multiplied for rate limiting, capped at `max-backoff-ms`.
    pub fn backoff_delay(&self, failed_attempts: u32, rate_limited: bool) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(32);
        let mut millis = self.config.backoff_base_ms.saturating_mul(1u64 << exponent);

        if rate_limited {
            millis = millis.saturating_mul(u64::from(self.config.rate_limit_multiplier));
        }

        Duration::from_millis(millis.min(self.config.max_backoff_ms))
    }

    /// Random pause drawn uniformly from the configured interval
    fn pacing_delay(&self) -> Duration {
        let (min, max) = (self.config.min_delay_ms, self.config.max_delay_ms);
        if min >= max {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

/// Maps a transport result to a payload or a typed source error
pub fn classify_response(
    url: &str,
    result: Result<SourceResponse, TransportError>,
) -> Result<Value, SourceError> {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            return Err(SourceError::Transport {
                url: url.to_string(),
                status: None,
                message: e.to_string(),
            })
        }
    };

    match response.status {
        200..=299 => Ok(response.body),
        404 | 410 => Err(SourceError::NotFound {
            url: url.to_string(),
        }),
        429 => Err(SourceError::RateLimited {
            url: url.to_string(),
        }),
        // The source answers 403 when the session looks automated; it clears up
        403 | 408 | 500..=599 => Err(SourceError::Transport {
            url: url.to_string(),
            status: Some(response.status),
            message: format!("HTTP {}", response.status),
        }),
        400..=499 => Err(SourceError::Rejected {
            url: url.to_string(),
            status: response.status,
        }),
        status => Err(SourceError::Transport {
            url: url.to_string(),
            status: Some(status),
            message: format!("unexpected HTTP {}", status),
        }),
    }
}

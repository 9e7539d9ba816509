// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Retry Policy
//!
//! First-class retry configuration for generation calls. The policy is a
//! plain value passed to the call site, so the backoff schedule and the
//! retryable-error predicate are testable units rather than decorator magic.
//!
//! Backoff is deterministic (no jitter): tests assert exact delays.

use std::time::Duration;

use crate::domain::llm::GenerationError;

/// Retry configuration for generation calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately. Useful in tests and for callers that
    /// manage pacing themselves.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Delay to sleep after the given zero-based failed attempt.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Whether the given failure on the given zero-based attempt warrants
    /// another try. Only transient transport errors are retried.
    pub fn should_retry(&self, error: &GenerationError, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts && error.is_transient()
    }
}

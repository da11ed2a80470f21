// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry policy with exponential backoff + jitter for transient recognition
// failures.
//
// Only failures of a transient `ErrorKind` reach this module; terminal
// failures are settled by the page loop before a retry is ever considered.

use std::time::Duration;

use satzwerk_core::config::RetryConfig;
use tracing::{debug, warn};

/// Result of evaluating whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Attempt budget spent.
    Exhausted,
}

/// Bounded attempt count plus backoff parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, before jitter.
    pub base_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after `attempts` failed attempts at `page_index`.
    pub fn decide(&self, page_index: u32, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            warn!(page_index, attempts, max = self.max_attempts, "retry limit exhausted");
            return RetryDecision::Exhausted;
        }
        let delay = self.compute_delay(page_index, attempts.saturating_sub(1));
        debug!(page_index, attempts, delay_ms = delay.as_millis() as u64, "scheduling retry");
        RetryDecision::RetryAfter(delay)
    }

    /// Exponential backoff with jitter.
    ///
    /// delay = min(base * 2^retry + jitter, max_delay), jitter in [0, base).
    pub fn compute_delay(&self, page_index: u32, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << retry.min(10));
        let seed = (u64::from(page_index) << 32) | u64::from(retry);
        let total_ms = exp_ms.saturating_add(hash_jitter(seed, base_ms));
        Duration::from_millis(total_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Spread-out value in `[0, bound)` derived from `seed`.
///
/// Deterministic, so pages retrying together still fan out across the
/// window without a random number generator.
pub fn hash_jitter(seed: u64, bound: u64) -> u64 {
    let hash = seed.wrapping_add(1).wrapping_mul(6364136223846793005);
    (hash >> 33) % bound.max(1)
}

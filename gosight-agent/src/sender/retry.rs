// Copyright 2025-Present GoSight Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Retry policies for the send paths.
//!
//! Workers retry individual batches on a short exponential schedule; the
//! per-sender connection task backs dialing off on a much longer one.

use std::time::Duration;

use tokio::time::sleep;
use tonic::Code;

/// Enum representing the type of backoff to use for the delay between
/// retries.
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub enum RetryBackoffType {
    /// The delay is constant for each attempt.
    Constant,
    /// The delay is doubled for each attempt.
    Exponential,
}

/// Retry policy for one batch: how many attempts and how long to sleep
/// before each of them.
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct RetryStrategy {
    max_attempts: u32,
    delay: Duration,
    backoff_type: RetryBackoffType,
}

impl Default for RetryStrategy {
    /// The worker policy: 5 attempts at 500 ms, 1 s, 2 s, 4 s, 8 s.
    fn default() -> Self {
        RetryStrategy {
            max_attempts: 5,
            delay: Duration::from_millis(500),
            backoff_type: RetryBackoffType::Exponential,
        }
    }
}

impl RetryStrategy {
    pub fn new(max_attempts: u32, delay: Duration, backoff_type: RetryBackoffType) -> Self {
        RetryStrategy {
            max_attempts,
            delay,
            backoff_type,
        }
    }

    /// The delay preceding the given attempt (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff_type {
            RetryBackoffType::Exponential => self.delay * 2u32.saturating_pow(attempt - 1),
            RetryBackoffType::Constant => self.delay,
        }
    }

    /// Sleep out the delay preceding the given attempt (1-indexed).
    pub async fn delay(&self, attempt: u32) {
        sleep(self.delay_for(attempt)).await;
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Dial backoff for the connection tasks: doubling from 1 s up to a 15 min
/// cap, after which the interval stays fixed.
#[derive(Debug, Clone)]
pub struct DialBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Default for DialBackoff {
    fn default() -> Self {
        DialBackoff::new(Duration::from_secs(1), Duration::from_secs(15 * 60))
    }
}

impl DialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        DialBackoff {
            initial,
            max,
            current: initial,
        }
    }

    /// The delay to sleep now; doubles the next one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Whether a gRPC status is worth retrying. Everything else is permanent
/// for that message and the batch is dropped after logging.
pub fn is_transient(code: Code) -> bool {
    matches!(
        code,
        Code::Unavailable | Code::Cancelled | Code::DeadlineExceeded | Code::ResourceExhausted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_worker_retry_schedule() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.max_attempts(), 5);
        let delays: Vec<Duration> = (1..=5).map(|n| strategy.delay_for(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn test_constant_schedule() {
        let strategy = RetryStrategy::new(
            3,
            Duration::from_secs(1),
            RetryBackoffType::Constant,
        );
        assert_eq!(strategy.delay_for(1), Duration::from_secs(1));
        assert_eq!(strategy.delay_for(3), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_sleeps_the_schedule() {
        let strategy = RetryStrategy::default();
        let start = Instant::now();
        strategy.delay(3).await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_dial_backoff_doubles_to_cap() {
        let mut backoff = DialBackoff::default();
        let mut delays = Vec::new();
        for _ in 0..12 {
            delays.push(backoff.next_delay());
        }
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[9], Duration::from_secs(512));
        // Capped at 15 minutes thereafter.
        assert_eq!(delays[10], Duration::from_secs(900));
        assert_eq!(delays[11], Duration::from_secs(900));
    }

    #[test]
    fn test_dial_backoff_reset() {
        let mut backoff = DialBackoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_transient_codes() {
        assert!(is_transient(Code::Unavailable));
        assert!(is_transient(Code::Cancelled));
        assert!(is_transient(Code::DeadlineExceeded));
        assert!(is_transient(Code::ResourceExhausted));
        assert!(!is_transient(Code::InvalidArgument));
        assert!(!is_transient(Code::Internal));
        assert!(!is_transient(Code::Unauthenticated));
    }
}

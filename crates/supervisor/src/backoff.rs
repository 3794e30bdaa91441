// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capped exponential backoff for auto-restart on unexpected worker exit.
//!
//! Resolves the open question spec.md flags: unbounded-rate auto-restart
//! would tight-loop a crashing worker. Base 100ms, factor 2, capped at
//! 30s; the counter resets once a generation survives `start_timeout` plus
//! a 2s minimum uptime as `Running`.

use std::time::Duration;

const BASE: Duration = Duration::from_millis(100);
const CAP: Duration = Duration::from_secs(30);
const FACTOR: u32 = 2;

/// Minimum time a generation must stay `Running` before a subsequent
/// unexpected exit is treated as a fresh failure rather than a continuation
/// of the same crash loop.
pub const MIN_UPTIME_RESET: Duration = Duration::from_secs(2);

/// Tracks consecutive unexpected-exit restarts and the delay to apply
/// before the next one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoRestartBackoff {
    consecutive_failures: u32,
}

impl AutoRestartBackoff {
    pub fn new() -> Self {
        Self { consecutive_failures: 0 }
    }

    /// Delay to wait before the next automatic restart attempt, then bumps
    /// the internal counter. First attempt after a reset is immediate.
    pub fn next_delay(&mut self) -> Duration {
        let delay = if self.consecutive_failures == 0 {
            Duration::ZERO
        } else {
            let exp = self.consecutive_failures.min(20);
            BASE.saturating_mul(FACTOR.saturating_pow(exp)).min(CAP)
        };
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    /// Call when a generation has proven itself `Running` for at least
    /// [`MIN_UPTIME_RESET`] plus the configured start timeout.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_immediate() {
        let mut b = AutoRestartBackoff::new();
        assert_eq!(b.next_delay(), Duration::ZERO);
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let mut b = AutoRestartBackoff::new();
        let delays: Vec<Duration> = (0..10).map(|_| b.next_delay()).collect();
        assert_eq!(delays[0], Duration::ZERO);
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert_eq!(delays[3], Duration::from_millis(800));
        assert!(delays.last().unwrap() <= &CAP);
        assert_eq!(*delays.last().unwrap(), CAP);
    }

    #[test]
    fn reset_restarts_the_sequence() {
        let mut b = AutoRestartBackoff::new();
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::ZERO);
    }

    #[yare::parameterized(
        first_call  = { 1, Duration::from_millis(0) },
        second_call = { 2, Duration::from_millis(200) },
        third_call  = { 3, Duration::from_millis(400) },
        fifth_call  = { 5, Duration::from_millis(1600) },
        ninth_call  = { 9, Duration::from_millis(25_600) },
    )]
    fn next_delay_at_call_n(calls: usize, expect_last: Duration) {
        let mut b = AutoRestartBackoff::new();
        let mut last = Duration::ZERO;
        for _ in 0..calls {
            last = b.next_delay();
        }
        assert_eq!(last, expect_last);
    }
}

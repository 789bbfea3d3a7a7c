//! Reconnect backoff.
//!
//! Exponential delay between reconnect attempts, capped at a maximum, with
//! a one-shot escalation once a failure streak grows long enough.

use std::time::Duration;

/// Outcome of recording one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffStep {
    /// Failed attempts in the current streak, including this one.
    pub attempt: u32,
    /// How long to wait before the next attempt.
    pub delay: Duration,
    /// True exactly once per streak, when the escalation threshold is reached.
    pub escalate: bool,
}

/// Reconnect backoff state.
///
/// Owned and mutated by the connection supervisor only.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay used for the first failure of a streak.
    initial: Duration,
    /// Upper bound for the delay.
    max: Duration,
    /// Failures before escalation.
    escalation_threshold: u32,
    /// Failed attempts since the last success.
    attempt: u32,
    /// Delay to use for the next failure.
    delay: Duration,
    /// Whether escalation already fired in this streak.
    escalated: bool,
}

impl Backoff {
    /// Create a backoff starting at `initial`, doubling up to `max`.
    pub fn new(initial: Duration, max: Duration, escalation_threshold: u32) -> Self {
        Self {
            initial,
            max,
            escalation_threshold,
            attempt: 0,
            delay: initial,
            escalated: false,
        }
    }

    /// Record a failed attempt and return how long to wait.
    ///
    /// The returned delays run `initial, 2*initial, 4*initial, ...` until
    /// they reach `max`, then stay there. Once escalated, every later delay
    /// in the streak is `max`.
    pub fn on_failure(&mut self) -> BackoffStep {
        self.attempt = self.attempt.saturating_add(1);
        let wait = self.delay;
        self.delay = self.delay.saturating_mul(2).min(self.max);

        let escalate = !self.escalated && self.attempt >= self.escalation_threshold;
        if escalate {
            self.escalated = true;
        }
        if self.escalated {
            self.delay = self.max;
        }

        BackoffStep {
            attempt: self.attempt,
            delay: wait,
            escalate,
        }
    }

    /// Reset after a success: attempts to zero, delay to initial, escalation cleared.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.delay = self.initial;
        self.escalated = false;
    }

    /// Failed attempts in the current streak.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay the next failure will wait.
    pub fn next_delay(&self) -> Duration {
        self.delay
    }

    /// Whether escalation fired in the current streak.
    pub fn is_escalated(&self) -> bool {
        self.escalated
    }
}

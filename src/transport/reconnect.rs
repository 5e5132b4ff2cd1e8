//! Reconnect policy as an explicit state machine.
//!
//! States: Idle -> Connecting -> Connected, with Backoff between failed
//! attempts and Parked after the attempt budget is spent. The machine holds
//! no timers and does no I/O; the session driver sleeps for whatever
//! `next_wait` returns, which keeps every transition testable in isolation.

use std::time::Duration;

use crate::constants::{
    RECONNECT_INITIAL_SECS, RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_SECS, RECONNECT_PARK_SECS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Idle,
    Connecting,
    Connected,
    Backoff { attempt: u32 },
    Parked,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: u32,
    pub park_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(RECONNECT_INITIAL_SECS),
            max: Duration::from_secs(RECONNECT_MAX_SECS),
            max_attempts: RECONNECT_MAX_ATTEMPTS,
            park_interval: Duration::from_secs(RECONNECT_PARK_SECS),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `attempt` (1-based): initial * 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(30));
        doubled.min(self.max)
    }
}

#[derive(Debug)]
pub struct ConnStateMachine {
    policy: ReconnectPolicy,
    state: ConnState,
    consecutive_failures: u32,
}

impl ConnStateMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnState::Idle,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// A dial is being attempted.
    pub fn on_connect_start(&mut self) {
        self.state = ConnState::Connecting;
    }

    /// The dial succeeded; the failure streak resets.
    pub fn on_connected(&mut self) {
        self.state = ConnState::Connected;
        self.consecutive_failures = 0;
    }

    /// An established connection dropped. Retry is immediate; backoff only
    /// applies to consecutive failed dials.
    pub fn on_disconnected(&mut self) {
        self.state = ConnState::Idle;
    }

    /// The dial failed. Moves to Backoff, or Parked once the attempt budget
    /// is exhausted.
    pub fn on_failure(&mut self) {
        self.consecutive_failures += 1;
        self.state = if self.consecutive_failures > self.policy.max_attempts {
            ConnState::Parked
        } else {
            ConnState::Backoff {
                attempt: self.consecutive_failures,
            }
        };
    }

    /// How long the driver should sleep before the next dial, if at all.
    pub fn next_wait(&self) -> Option<Duration> {
        match self.state {
            ConnState::Backoff { attempt } => Some(self.policy.delay_for(attempt)),
            ConnState::Parked => Some(self.policy.park_interval),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence_then_park() {
        let mut machine = ConnStateMachine::new(ReconnectPolicy::default());
        let mut waits = Vec::new();

        for _ in 0..5 {
            machine.on_connect_start();
            machine.on_failure();
            waits.push(machine.next_wait().unwrap().as_secs());
        }
        assert_eq!(waits, vec![1, 2, 4, 8, 10]);

        // Sixth and later failures park with periodic 30s retries
        for _ in 0..3 {
            machine.on_connect_start();
            machine.on_failure();
            assert_eq!(machine.state(), ConnState::Parked);
            assert_eq!(machine.next_wait().unwrap().as_secs(), 30);
        }
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut machine = ConnStateMachine::new(ReconnectPolicy::default());
        for _ in 0..4 {
            machine.on_connect_start();
            machine.on_failure();
        }
        machine.on_connect_start();
        machine.on_connected();
        assert_eq!(machine.state(), ConnState::Connected);

        // The streak restarts from 1s
        machine.on_connect_start();
        machine.on_failure();
        assert_eq!(machine.next_wait().unwrap().as_secs(), 1);
    }

    #[test]
    fn test_disconnect_retries_immediately() {
        let mut machine = ConnStateMachine::new(ReconnectPolicy::default());
        machine.on_connect_start();
        machine.on_connected();
        machine.on_disconnected();
        assert_eq!(machine.state(), ConnState::Idle);
        assert_eq!(machine.next_wait(), None);
    }

    #[test]
    fn test_delay_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1).as_secs(), 1);
        assert_eq!(policy.delay_for(4).as_secs(), 8);
        assert_eq!(policy.delay_for(5).as_secs(), 10);
        assert_eq!(policy.delay_for(20).as_secs(), 10);
    }
}

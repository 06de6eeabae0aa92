//! Countdown engine

use kidmode_host_api::TimerToken;
use std::time::Duration;

use crate::{Decrement, SessionState};

/// Period of the countdown tick
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Countdown engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Running { token: TimerToken },
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a superseded or stopped run; nothing changed
    Stale,
    /// One second elapsed
    Ticked { remaining: u64 },
    /// The last second elapsed and the session was reset
    Expired,
}

/// Drives the session countdown one tick at a time
///
/// Every `start` mints a token with a new epoch. Only ticks carrying the
/// current token touch the session, so a tick that was already in flight
/// when the countdown stopped is inert.
#[derive(Debug)]
pub struct CountdownEngine {
    state: CountdownState,
    epoch: u64,
}

impl CountdownEngine {
    pub fn new() -> Self {
        Self {
            state: CountdownState::Idle,
            epoch: 0,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, CountdownState::Running { .. })
    }

    pub fn current_token(&self) -> Option<TimerToken> {
        match self.state {
            CountdownState::Running { token } => Some(token),
            CountdownState::Idle => None,
        }
    }

    /// Begin a new run. Any previous run is superseded; its token is
    /// returned so the caller can cancel it.
    pub fn start(&mut self) -> (TimerToken, Option<TimerToken>) {
        let previous = self.current_token();
        self.epoch += 1;
        let token = TimerToken::new(self.epoch);
        self.state = CountdownState::Running { token };
        (token, previous)
    }

    /// Stop the current run, returning its token
    pub fn stop(&mut self) -> Option<TimerToken> {
        let token = self.current_token();
        self.state = CountdownState::Idle;
        token
    }

    /// Apply one tick to `session`
    pub fn tick(&mut self, token: TimerToken, session: &mut SessionState) -> TickOutcome {
        if self.current_token() != Some(token) {
            return TickOutcome::Stale;
        }

        match session.decrement() {
            Decrement::Remaining(remaining) => TickOutcome::Ticked { remaining },
            Decrement::ReachedZero => {
                self.state = CountdownState::Idle;
                TickOutcome::Expired
            }
            Decrement::NotRunning => {
                // Session was stopped without stopping us
                self.state = CountdownState::Idle;
                TickOutcome::Stale
            }
        }
    }
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

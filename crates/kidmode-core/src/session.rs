//! Session state and its transitions

use kidmode_api::Session;

/// Result of taking one second off the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// Still running with this many seconds left
    Remaining(u64),
    /// The last second elapsed and the session was reset
    ReachedZero,
    /// Nothing to decrement
    NotRunning,
}

/// Owner of the authoritative [`Session`]
///
/// Every mutator checks its precondition and returns whether it applied.
/// None of them can leave the session in a state that breaks
/// `running => restricted` or `remaining > 0 => running`.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session: Session,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session: Session::INITIAL,
        }
    }

    pub fn snapshot(&self) -> Session {
        self.session
    }

    pub fn is_restricted(&self) -> bool {
        self.session.restricted
    }

    pub fn is_running(&self) -> bool {
        self.session.running
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.session.remaining_seconds
    }

    /// Restrict without a time limit. Requires an unrestricted session.
    pub fn enable(&mut self) -> bool {
        if self.session.restricted {
            return false;
        }
        self.session = Session {
            restricted: true,
            remaining_seconds: 0,
            running: false,
        };
        true
    }

    /// Restrict for `seconds`. Requires an unrestricted session and a
    /// non-zero duration.
    pub fn enable_with_timer(&mut self, seconds: u64) -> bool {
        if self.session.restricted || seconds == 0 {
            return false;
        }
        self.session = Session {
            restricted: true,
            remaining_seconds: seconds,
            running: true,
        };
        true
    }

    /// Lift the restriction. Requires a restricted session.
    pub fn disable(&mut self) -> bool {
        if !self.session.restricted {
            return false;
        }
        self.session = Session::INITIAL;
        true
    }

    /// Take one second off a running countdown. The final second resets the
    /// session in the same step.
    pub fn decrement(&mut self) -> Decrement {
        if !self.session.running || self.session.remaining_seconds == 0 {
            return Decrement::NotRunning;
        }

        if self.session.remaining_seconds == 1 {
            self.session = Session::INITIAL;
            return Decrement::ReachedZero;
        }

        self.session.remaining_seconds -= 1;
        Decrement::Remaining(self.session.remaining_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrestricted() {
        let state = SessionState::new();
        assert_eq!(state.snapshot(), Session::INITIAL);
        assert!(!state.is_restricted());
    }

    #[test]
    fn enable_requires_unrestricted() {
        let mut state = SessionState::new();
        assert!(state.enable());
        assert!(state.is_restricted());
        assert!(!state.is_running());

        assert!(!state.enable());
        assert!(!state.enable_with_timer(60));
        assert_eq!(state.remaining_seconds(), 0);
    }

    #[test]
    fn disable_requires_restricted() {
        let mut state = SessionState::new();
        assert!(!state.disable());

        state.enable_with_timer(90);
        assert!(state.disable());
        assert_eq!(state.snapshot(), Session::INITIAL);
    }

    #[test]
    fn zero_second_timer_rejected() {
        let mut state = SessionState::new();
        assert!(!state.enable_with_timer(0));
        assert_eq!(state.snapshot(), Session::INITIAL);
    }

    #[test]
    fn decrement_to_zero_resets() {
        let mut state = SessionState::new();
        state.enable_with_timer(2);

        assert_eq!(state.decrement(), Decrement::Remaining(1));
        assert!(state.snapshot().is_consistent());
        assert_eq!(state.decrement(), Decrement::ReachedZero);
        assert_eq!(state.snapshot(), Session::INITIAL);
        assert_eq!(state.decrement(), Decrement::NotRunning);
    }

    #[test]
    fn decrement_ignores_untimed_restriction() {
        let mut state = SessionState::new();
        state.enable();
        assert_eq!(state.decrement(), Decrement::NotRunning);
        assert!(state.is_restricted());
    }
}

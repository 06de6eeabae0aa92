//! Mock capabilities for testing

use kidmode_api::Notification;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{HostError, HostResult, NotificationSink, Scheduler, TimerToken};

/// Scheduler that records schedule/cancel calls and never fires on its own
///
/// Tests drive ticks by hand, feeding the active token back to the core.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    active: Arc<Mutex<BTreeMap<TimerToken, Duration>>>,
    cancelled: Arc<Mutex<Vec<TimerToken>>>,

    /// Configure schedule to fail
    pub fail_schedule: Arc<Mutex<bool>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens currently scheduled
    pub fn active_tokens(&self) -> Vec<TimerToken> {
        self.active.lock().unwrap().keys().copied().collect()
    }

    /// The single active token, if exactly one is scheduled
    pub fn active_token(&self) -> Option<TimerToken> {
        let active = self.active.lock().unwrap();
        if active.len() == 1 {
            active.keys().next().copied()
        } else {
            None
        }
    }

    pub fn is_active(&self, token: TimerToken) -> bool {
        self.active.lock().unwrap().contains_key(&token)
    }

    pub fn period_of(&self, token: TimerToken) -> Option<Duration> {
        self.active.lock().unwrap().get(&token).copied()
    }

    /// Every token that has been cancelled, in order
    pub fn cancelled_tokens(&self) -> Vec<TimerToken> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, token: TimerToken, period: Duration) -> HostResult<()> {
        if *self.fail_schedule.lock().unwrap() {
            return Err(HostError::ScheduleFailed("Mock schedule failure".into()));
        }
        self.active.lock().unwrap().insert(token, period);
        Ok(())
    }

    fn cancel(&self, token: TimerToken) -> HostResult<()> {
        if self.active.lock().unwrap().remove(&token).is_some() {
            self.cancelled.lock().unwrap().push(token);
        }
        Ok(())
    }
}

/// Sink that keeps every notification it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    received: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }

    /// Drain everything received so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.received.lock().unwrap())
    }

    pub fn count(&self, wanted: &Notification) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|n| *n == wanted)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}

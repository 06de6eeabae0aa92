//! Tokio-backed scheduler

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{HostError, HostResult, Scheduler, TimerToken};

/// Scheduler that runs one tokio task per scheduled token
///
/// Fired tokens are sent on an unbounded channel. The service's main loop
/// receives them and feeds them to the core one at a time.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerToken>,
    tasks: Mutex<HashMap<TimerToken, JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver on which fired tokens arrive
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerToken>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            tx,
            tasks: Mutex::new(HashMap::new()),
        };
        (scheduler, rx)
    }

    /// Number of tokens with a live task
    pub fn active_count(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, token: TimerToken, period: Duration) -> HostResult<()> {
        if period.is_zero() {
            return Err(HostError::ScheduleFailed("period must be non-zero".into()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HostError::ScheduleFailed(e.to_string()))?;

        let tx = self.tx.clone();
        let task = runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(token).is_err() {
                    debug!(%token, "Tick receiver gone, stopping timer task");
                    break;
                }
            }
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| HostError::Internal("scheduler lock poisoned".into()))?;
        if let Some(previous) = tasks.insert(token, task) {
            warn!(%token, "Token scheduled twice, replacing previous task");
            previous.abort();
        }

        debug!(%token, period_ms = period.as_millis() as u64, "Timer scheduled");
        Ok(())
    }

    fn cancel(&self, token: TimerToken) -> HostResult<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| HostError::Internal("scheduler lock poisoned".into()))?;
        if let Some(task) = tasks.remove(&token) {
            task.abort();
            debug!(%token, "Timer cancelled");
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

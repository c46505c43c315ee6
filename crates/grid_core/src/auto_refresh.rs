use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::debug;

struct ActiveTimer {
    period: Duration,
    task: JoinHandle<()>,
}

/// Owned handle to at most one periodic refresh task.
#[derive(Default)]
pub struct AutoRefreshTimer {
    active: Option<ActiveTimer>,
}

impl AutoRefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.active.as_ref().map(|active| active.period)
    }

    /// Runs `tick` every `period`, first after one full period. A tick
    /// returning `false` ends the task. Starting with the running period is a
    /// no-op; a different period replaces the running task. Returns whether a
    /// new task was spawned.
    pub fn start<F, Fut>(&mut self, period: Duration, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        if self.period() == Some(period) {
            return false;
        }
        self.stop();

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if !tick().await {
                    break;
                }
            }
        });
        debug!(period_ms = period.as_millis() as u64, "auto refresh started");
        self.active = Some(ActiveTimer { period, task });
        true
    }

    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
            debug!("auto refresh stopped");
        }
    }
}

impl Drop for AutoRefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/auto_refresh_tests.rs"]
mod tests;

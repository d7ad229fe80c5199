//! Tick scheduler.
//!
//! Drives [`TimerService::tick`] once per interval on a tokio task while it is
//! started. `stop()` signals the task and waits for it to exit, so once it
//! returns no further tick can mutate the collection. Dropping a running
//! scheduler aborts its task.
//!
//! ```ignore
//! let service = Arc::new(TimerService::open(Database::open()?)?);
//! let mut scheduler = TickScheduler::new(Duration::from_secs(1));
//! scheduler.start(Arc::clone(&service));
//! // ...
//! scheduler.stop().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::service::{Durability, Repository, TimerService};

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

/// Owner of the periodic tick task.
pub struct TickScheduler {
    period: Duration,
    running: Option<Running>,
    ticks_tx: watch::Sender<u64>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        let (ticks_tx, _) = watch::channel(0);
        Self {
            period,
            running: None,
            ticks_tx,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Number of ticks fired since the scheduler was created.
    ///
    /// Callers can `wait_for` a count on the returned receiver.
    pub fn ticks(&self) -> watch::Receiver<u64> {
        self.ticks_tx.subscribe()
    }

    /// Spawn the tick task. The first tick fires one period after start.
    ///
    /// Returns `false` without doing anything if already started.
    /// Must be called from within a tokio runtime.
    pub fn start<R: Repository + 'static>(&mut self, service: Arc<TimerService<R>>) -> bool {
        if self.is_running() {
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let ticks_tx = self.ticks_tx.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;

            let mut fired = 0u64;
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let report = service.tick();
                        fired += 1;
                        if !report.events.is_empty() || !report.faults.is_empty() {
                            debug!(
                                tick = fired,
                                events = report.events.len(),
                                faults = report.faults.len(),
                                "tick"
                            );
                        }
                        if let Durability::NotCommitted(e) = &report.durability {
                            warn!(error = %e, "tick applied in memory only");
                        }
                        for e in &report.history_errors {
                            error!(error = %e, "completion not recorded in history");
                        }
                        ticks_tx.send_modify(|n| *n += 1);
                    }
                }
            }
            fired
        });

        info!(period = ?self.period, "tick scheduler started");
        self.running = Some(Running { stop_tx, handle });
        true
    }

    /// Stop ticking and wait for the task to finish.
    ///
    /// Returns the number of ticks fired during this run, or `None` if the
    /// scheduler was not started.
    pub async fn stop(&mut self) -> Option<u64> {
        let Running { stop_tx, handle } = self.running.take()?;
        let _ = stop_tx.send(true);
        match handle.await {
            Ok(fired) => {
                info!(ticks = fired, "tick scheduler stopped");
                Some(fired)
            }
            Err(e) => {
                error!(error = %e, "tick task ended abnormally");
                None
            }
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::{Category, NewTimer, TimerStatus};

    fn service_with_timer(duration: i64) -> (Arc<TimerService<MemoryStore>>, crate::timer::TimerId) {
        let service = TimerService::open(MemoryStore::new()).unwrap();
        let timer = service
            .create(NewTimer::new("t", duration, Category::Study))
            .unwrap()
            .value;
        service.start(&timer.id);
        (Arc::new(service), timer.id)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (service, id) = service_with_timer(10);
        let mut scheduler = TickScheduler::new(Duration::from_secs(1));
        assert!(scheduler.start(Arc::clone(&service)));
        assert!(!scheduler.start(Arc::clone(&service)));

        let mut ticks = scheduler.ticks();
        ticks.wait_for(|n| *n >= 3).await.unwrap();
        assert_eq!(scheduler.stop().await, Some(3));
        assert_eq!(service.timer(&id).unwrap().remaining_time, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_stop() {
        let (service, id) = service_with_timer(10);
        let mut scheduler = TickScheduler::new(Duration::from_secs(1));
        scheduler.start(Arc::clone(&service));
        scheduler.ticks().wait_for(|n| *n >= 2).await.unwrap();
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        let frozen = service.timer(&id).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(service.timer(&id).unwrap(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop() {
        let (service, id) = service_with_timer(3);
        let mut scheduler = TickScheduler::new(Duration::from_secs(1));
        scheduler.start(Arc::clone(&service));
        scheduler.ticks().wait_for(|n| *n >= 1).await.unwrap();
        scheduler.stop().await;

        assert!(scheduler.start(Arc::clone(&service)));
        scheduler.ticks().wait_for(|n| *n >= 3).await.unwrap();
        scheduler.stop().await;

        let timer = service.timer(&id).unwrap();
        assert_eq!(timer.status, TimerStatus::Completed);
        assert_eq!(service.history().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_without_start_is_none() {
        let mut scheduler = TickScheduler::new(Duration::from_secs(1));
        assert_eq!(scheduler.stop().await, None);
    }
}

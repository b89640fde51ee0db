use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::Sampler;
use crate::error::SchedulerError;
use crate::models::StatsSnapshot;
use crate::publisher::SnapshotPublisher;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Counts live driver tasks; decremented when the task's future is dropped.
struct DriverGuard(Arc<AtomicUsize>);

impl DriverGuard {
    fn new(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Drives a [`Sampler`] on a fixed period from a tokio task.
pub struct Scheduler {
    sampler: Arc<Mutex<Sampler>>,
    publisher: Arc<SnapshotPublisher>,
    interval: Duration,
    driver: Mutex<Option<JoinHandle<()>>>,
    active: Arc<AtomicUsize>,
}

impl Scheduler {
    pub fn new(sampler: Sampler, interval: Duration) -> Self {
        let publisher = Arc::clone(sampler.publisher());
        Self {
            sampler: Arc::new(Mutex::new(sampler)),
            publisher,
            interval,
            driver: Mutex::new(None),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Begin periodic sampling. The first cycle runs immediately.
    ///
    /// Calling this while a driver is already running is a no-op. Must be
    /// called from within a tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let runtime = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let mut driver = lock(&self.driver);
        if driver.as_ref().is_some_and(|d| !d.is_finished()) {
            debug!("sampler already running");
            return Ok(());
        }

        let sampler = Arc::clone(&self.sampler);
        let interval = self.interval;
        let guard = DriverGuard::new(&self.active);
        *driver = Some(runtime.spawn(async move {
            let _guard = guard;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Sources do blocking file and process I/O. An abort while
                // this is pending still lets the cycle finish and publish.
                let sampler = Arc::clone(&sampler);
                let cycle = tokio::task::spawn_blocking(move || {
                    lock(&sampler).run_cycle(Instant::now())
                })
                .await;
                match cycle {
                    Ok(snapshot) => debug!(
                        cycle = snapshot.cycle,
                        stale = snapshot.stale.len(),
                        "cycle complete"
                    ),
                    Err(e) => warn!(error = %e, "sampling cycle panicked"),
                }
            }
        }));

        info!(interval_ms = interval.as_millis() as u64, "sampler started");
        Ok(())
    }

    /// Stop periodic sampling. Idempotent; state and history are kept.
    pub fn stop(&self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
            info!("sampler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.driver).as_ref().is_some_and(|d| !d.is_finished())
    }

    /// Driver tasks that have not yet been torn down.
    pub fn active_drivers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Run one cycle on the caller's thread, outside the periodic driver.
    pub fn run_cycle_now(&self) -> Arc<StatsSnapshot> {
        lock(&self.sampler).run_cycle(Instant::now())
    }

    pub fn publisher(&self) -> &Arc<SnapshotPublisher> {
        &self.publisher
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Completed cycles so far.
    pub fn cycle(&self) -> u64 {
        lock(&self.sampler).cycle()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

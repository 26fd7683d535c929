//! # corun-executor — The driver loop
//!
//! The driver is the orchestrator thread of a corun system. It runs
//! this loop:
//!
//! ```text
//! loop {
//!     1. Read the monotonic time (milliseconds since start)
//!     2. Drain up to dequeue_size completions, run callbacks inline
//!     3. scheduler.run_until_blocked(now)
//!     4. aio.flush(now)
//!     5. Exit if stopped and the scheduler is empty, else sleep
//! }
//! ```
//!
//! Completions drained in step 2 set final values, so computations they
//! unblock run in step 3 of the same iteration. Completions arriving
//! during a tick are observed no earlier than the next iteration.
//!
//! The driver owns the scheduler (which owns the bus), so one thread
//! performs every dispatch, drain, tick, and flush.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use corun_core::aio::Aio;
use corun_runtime::Scheduler;

/// Configuration for the driver loop.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum completions drained per iteration (default: 100)
    pub dequeue_size: usize,
    /// Pause between iterations (default: 1ms)
    pub tick_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            dequeue_size: 100,
            tick_interval: Duration::from_millis(1),
        }
    }
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-iteration completion drain limit
    pub fn dequeue_size(mut self, n: usize) -> Self {
        self.dequeue_size = n;
        self
    }

    /// Set the pause between iterations
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// The driver loop. Returns once `stop` is set and the scheduler has
/// drained, after shutting the scheduler (and through it the bus) down.
pub fn driver_loop<A: Aio>(scheduler: &mut Scheduler<A>, config: &DriverConfig, stop: &AtomicBool) {
    let epoch = Instant::now();

    loop {
        let now = epoch.elapsed().as_millis() as u64;

        // ── Drain completions; callbacks run inline and may set final
        // values observed by the tick below. ──
        let cqes = scheduler.aio_mut().dequeue(config.dequeue_size);
        if !cqes.is_empty() {
            debug!("t={now}: draining {} completions", cqes.len());
        }
        for cqe in cqes {
            cqe.complete();
        }

        // ── Drive computations to this tick's fixed point. ──
        scheduler.run_until_blocked(now);

        // ── Time-based subsystem work. ──
        scheduler.aio_mut().flush(now);

        if stop.load(Ordering::Acquire) && scheduler.total() == 0 {
            break;
        }

        thread::park_timeout(config.tick_interval);
    }

    // Quiescent: no computation is runnable, blocked, or queued, so no
    // completion can still be owed. Drain defensively, then tear down.
    loop {
        let cqes = scheduler.aio_mut().dequeue(config.dequeue_size);
        if cqes.is_empty() {
            break;
        }
        for cqe in cqes {
            cqe.complete();
        }
    }
    scheduler.shutdown();
}

/// Handle to a driver running on its own thread.
pub struct Driver {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Driver {
    /// Consume the scheduler and drive it on a dedicated thread.
    pub fn spawn<A: Aio + 'static>(mut scheduler: Scheduler<A>, config: DriverConfig) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("corun-driver".into())
            .spawn(move || {
                info!("driver started");
                driver_loop(&mut scheduler, &config, &flag);
                info!("driver stopped");
            })
            .expect("failed to spawn driver thread");
        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Request stop, wait for the scheduler to drain, and join.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            handle.join().expect("driver thread panicked");
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        // Signal but don't join; an explicit shutdown() waits for drain.
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = &self.thread {
            handle.thread().unpark();
        }
    }
}

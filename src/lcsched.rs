//! Background scheduling loop.
//!
//! A [`Scheduler`] owns a [`JobRegistry`] and, while running, a single tokio task that checks
//! the registry once per tick and runs whatever is due. Independent schedulers can coexist.

pub mod jobs;
pub mod registry;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use jobs::Notifier;
pub use registry::{DaySpec, JobRegistry, ReminderFrequency, ScheduledJob, Trigger, job_action};

/// Triggers have minute granularity, so the tick may not be any coarser than this.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = MAX_POLL_INTERVAL;
/// How long [`Scheduler::stop`] waits for the loop before abandoning it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of "now" for due checks and report dates.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

struct Worker {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    registry: Arc<JobRegistry>,
    poll_interval: Duration,
    stop_timeout: Duration,
    clock: Clock,
    worker: Mutex<Option<Worker>>,
}

impl Scheduler {
    pub fn new(poll_interval: Duration) -> Self {
        let poll_interval = if poll_interval.is_zero() {
            log::warn!("[Scheduler::new] Poll interval of zero, using {DEFAULT_POLL_INTERVAL:?}");
            DEFAULT_POLL_INTERVAL
        } else if poll_interval > MAX_POLL_INTERVAL {
            log::warn!("[Scheduler::new] Poll interval {poll_interval:?} is coarser than a minute, clamping");
            MAX_POLL_INTERVAL
        } else {
            poll_interval
        };

        Self {
            registry: Arc::new(JobRegistry::new(poll_interval)),
            poll_interval,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            clock: system_clock(),
            worker: Mutex::new(None),
        }
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn register(&self, job: ScheduledJob) {
        self.registry.register(job);
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Spawns the loop onto the current tokio runtime.
    ///
    /// Returns `false` (and logs a warning) if the loop is already running.
    pub fn start(&self) -> bool {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            log::warn!("[Scheduler::start] Scheduler is already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.registry),
            self.poll_interval,
            Arc::clone(&self.clock),
            stop_rx,
        ));

        *worker = Some(Worker { stop_tx, handle });
        log::info!("[Scheduler::start] Scheduler started");
        true
    }

    /// Signals the loop to exit and waits up to the stop timeout for it.
    ///
    /// A job that is still running is not interrupted; if it outlasts the timeout the loop is
    /// left to finish on its own and the scheduler counts as stopped regardless.
    pub async fn stop(&self) {
        let Some(worker) = self.lock_worker().take() else {
            log::debug!("[Scheduler::stop] Scheduler is not running");
            return;
        };

        // The receiver may already be gone if the loop exited; that is fine.
        let _ = worker.stop_tx.send(true);

        match tokio::time::timeout(self.stop_timeout, worker.handle).await {
            Ok(Ok(())) => log::info!("[Scheduler::stop] Scheduler stopped"),
            Ok(Err(err)) => log::error!("[Scheduler::stop] Scheduler loop ended abnormally: {err}"),
            Err(_) => log::warn!(
                "[Scheduler::stop] Loop did not exit within {:?}, abandoning it",
                self.stop_timeout
            ),
        }
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_loop(
    registry: Arc<JobRegistry>,
    poll_interval: Duration,
    clock: Clock,
    mut stop_rx: watch::Receiver<bool>,
) {
    log::info!(
        "[run_loop] Polling {} job(s) every {poll_interval:?}",
        registry.len()
    );

    // Fixed-rate ticks: time spent running jobs does not push later ticks back.
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                // Sender dropped along with the scheduler.
                if changed.is_err() {
                    break;
                }
            }
        }

        if *stop_rx.borrow() {
            break;
        }

        let fired = registry.run_pending(clock()).await;
        if fired > 0 {
            log::debug!("[run_loop] Ran {fired} job(s)");
        }
    }

    log::info!("[run_loop] Scheduler loop exited");
}

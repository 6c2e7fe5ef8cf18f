//! Fixed-interval scheduling with an overlap guard
//!
//! Each tick is spawned as its own task, so a run that outlasts the interval
//! overlaps the next tick. Jobs use [`RunGuard`] to turn an overlapping tick
//! into a no-op instead of queueing it.

use async_trait::async_trait;
use eyre::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Result of a single scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The job ran to completion (successfully or not)
    Completed,
    /// A previous run was still in progress; nothing was done
    Skipped,
}

/// Scoped ownership of a job's `Running` state.
///
/// Acquired with a compare-and-swap on the flag; dropping the guard returns
/// the job to `Idle`, including when the run errors or panics.
#[must_use = "the job is Idle again as soon as the guard is dropped"]
pub struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    /// Transition `Idle -> Running`, or return `None` if already running
    pub fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A job driven by [`run_periodic`]
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Perform one tick. Errors are handled inside the job.
    async fn tick(&self) -> TickOutcome;
}

/// Run `job` every `interval` until a shutdown signal arrives.
///
/// On shutdown no new ticks are started and in-flight runs are awaited
/// before returning.
pub async fn run_periodic<J: PeriodicJob>(
    job: Arc<J>,
    interval: Duration,
    mut shutdown: mpsc::Receiver<()>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: JoinSet<TickOutcome> = JoinSet::new();

    info!(
        job = job.name(),
        interval_ms = interval.as_millis() as u64,
        "Starting periodic job"
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(
                    job = job.name(),
                    in_flight = in_flight.len(),
                    "Shutdown signal received, draining in-flight runs"
                );
                break;
            }
            _ = ticker.tick() => {
                let job = job.clone();
                in_flight.spawn(async move { job.tick().await });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                log_joined(job.name(), joined);
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        log_joined(job.name(), joined);
    }

    info!(job = job.name(), "Periodic job stopped");
    Ok(())
}

fn log_joined(name: &'static str, joined: Result<TickOutcome, tokio::task::JoinError>) {
    match joined {
        Ok(outcome) => debug!(job = name, ?outcome, "Tick finished"),
        Err(e) => error!(job = name, error = %e, "Tick task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::try_acquire(&flag);
        assert!(guard.is_some());
        assert!(RunGuard::try_acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(RunGuard::try_acquire(&flag).is_some());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let flag = AtomicBool::new(false);
        let result = std::panic::catch_unwind(|| {
            let _guard = RunGuard::try_acquire(&flag).unwrap();
            panic!("run failed");
        });
        assert!(result.is_err());
        assert!(!flag.load(Ordering::Acquire));
    }

    struct CountingJob {
        ticks: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn tick(&self) -> TickOutcome {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            TickOutcome::Completed
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_periodic_ticks_until_shutdown() {
        let job = Arc::new(CountingJob {
            ticks: AtomicUsize::new(0),
        });
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(run_periodic(job.clone(), Duration::from_secs(10), rx));

        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.send(()).await.unwrap();
        handle.await.unwrap().unwrap();

        // Immediate first tick, then at 10s and 20s
        assert_eq!(job.ticks.load(Ordering::SeqCst), 3);
    }
}

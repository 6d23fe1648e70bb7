// Self-rescheduling polling task with health tracking

use super::delay::{DelayStrategy, UniformJitter};
use super::engine::{action, run_action, TaskLoop, TaskScheduler};
use crate::health::{HealthCheck, HealthStatus};
use metrics::counter;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const UNHEALTHY_MESSAGE: &str = "last run did not succeed";

/// Periodically runs an action and reports whether its last run succeeded
///
/// The first run happens when the task is started; later runs
/// follow a random delay in `[0, 2 × period)` after the previous run
/// completes. Failures (errors or panics) are logged and recorded, never
/// propagated, and never stop the schedule.
#[derive(Debug)]
pub struct ScraperTask {
    name: String,
    last_run_succeeded: Arc<AtomicBool>,
    started: AtomicBool,
}

impl ScraperTask {
    /// Create a task that has not run yet and reports healthy until it does
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            last_run_succeeded: Arc::new(AtomicBool::new(true)),
            started: AtomicBool::new(false),
        })
    }

    /// Run `f` once now, then keep running it on `scheduler` with jittered delays
    pub async fn create_and_start<F, Fut>(
        scheduler: &TaskScheduler,
        name: impl Into<String>,
        period: Duration,
        f: F,
    ) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task = Self::new(name);
        task.start(scheduler, period, f).await;
        task
    }

    /// Same as [`ScraperTask::create_and_start`] with an explicit delay strategy
    pub async fn create_and_start_with_delays<F, Fut, D>(
        scheduler: &TaskScheduler,
        name: impl Into<String>,
        delays: D,
        f: F,
    ) -> Arc<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        D: DelayStrategy + 'static,
    {
        let task = Self::new(name);
        task.start_with_delays(scheduler, delays, f).await;
        task
    }

    /// Start a task built with [`ScraperTask::new`]
    pub async fn start<F, Fut>(&self, scheduler: &TaskScheduler, period: Duration, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.start_with_delays(scheduler, UniformJitter::new(period), f)
            .await
    }

    /// Run `f` once now, then hand the loop to `scheduler`
    ///
    /// Only the first call starts anything.
    #[instrument(skip(self, scheduler, delays, f), fields(scheduler = %scheduler.name(), task = %self.name))]
    pub async fn start_with_delays<F, Fut, D>(&self, scheduler: &TaskScheduler, delays: D, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        D: DelayStrategy + 'static,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("Scraper task already started");
            return;
        }

        let action = action(f);

        // First run is eager so health is meaningful as soon as we return
        let outcome = run_action(&action).await;
        record_outcome(&self.name, &self.last_run_succeeded, &outcome);

        let health = Arc::clone(&self.last_run_succeeded);
        let task_name = self.name.clone();
        let first_delay = delays.next_delay();
        scheduler
            .spawn(TaskLoop {
                name: self.name.clone(),
                action,
                delays: Box::new(delays),
                first_delay,
                on_outcome: Box::new(move |outcome| record_outcome(&task_name, &health, outcome)),
            })
            .await;

        info!(
            healthy = self.last_run_succeeded(),
            next_run_in_ms = first_delay.as_millis() as u64,
            "Scraper task started"
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_run_succeeded(&self) -> bool {
        self.last_run_succeeded.load(Ordering::Acquire)
    }
}

impl HealthCheck for ScraperTask {
    fn check(&self) -> HealthStatus {
        if self.last_run_succeeded() {
            HealthStatus::Healthy
        } else {
            HealthStatus::unhealthy(UNHEALTHY_MESSAGE)
        }
    }
}

fn record_outcome(name: &str, last_run_succeeded: &AtomicBool, outcome: &anyhow::Result<()>) {
    match outcome {
        Ok(()) => {
            debug!(task = %name, "Task run succeeded");
            counter!("scraper_task_runs_total", "task" => name.to_string(), "outcome" => "success")
                .increment(1);
        }
        Err(e) => {
            warn!(task = %name, error = %format!("{:#}", e), "Running the task failed");
            counter!("scraper_task_runs_total", "task" => name.to_string(), "outcome" => "failure")
                .increment(1);
        }
    }
    last_run_succeeded.store(outcome.is_ok(), Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::delay::FixedDelay;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Action returning scripted outcomes, succeeding once the script runs out
    fn scripted(
        outcomes: Vec<bool>,
    ) -> (
        Arc<AtomicUsize>,
        impl Fn() -> futures::future::Ready<anyhow::Result<()>> + Send + Sync + 'static,
    ) {
        let runs = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Mutex::new(VecDeque::from(outcomes)));
        let counter = runs.clone();
        let f = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let succeed = script.lock().unwrap().pop_front().unwrap_or(true);
            futures::future::ready(if succeed {
                Ok(())
            } else {
                Err(anyhow::anyhow!("scrape failed"))
            })
        };
        (runs, f)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_happens_before_start_returns() {
        let scheduler = TaskScheduler::new("test");
        let (runs, f) = scripted(vec![true]);

        let task =
            ScraperTask::create_and_start(&scheduler, "eager", Duration::from_secs(900), f).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(task.check(), HealthStatus::Healthy);
        assert_eq!(task.name(), "eager");
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstarted_task_is_healthy_and_starts_once() {
        let scheduler = TaskScheduler::new("test");
        let (runs, f) = scripted(vec![false]);

        let task = ScraperTask::new("deferred");
        assert_eq!(task.check(), HealthStatus::Healthy);
        assert_eq!(scheduler.task_count().await, 0);

        let f = Arc::new(f);
        let first = Arc::clone(&f);
        task.start(&scheduler, Duration::from_secs(900), move || first())
            .await;
        let second = Arc::clone(&f);
        task.start(&scheduler, Duration::from_secs(900), move || second())
            .await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.task_count().await, 1);
        assert!(!task.check().is_healthy());
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_is_unhealthy_and_schedule_continues() {
        let scheduler = TaskScheduler::new("test");
        let (runs, f) = scripted(vec![false, false]);

        let task = ScraperTask::create_and_start_with_delays(
            &scheduler,
            "failing",
            FixedDelay::new(Duration::from_secs(10)),
            f,
        )
        .await;
        assert_eq!(
            task.check(),
            HealthStatus::Unhealthy("last run did not succeed".to_string())
        );

        sleep(Duration::from_secs(15)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!task.check().is_healthy());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(task.check(), HealthStatus::Healthy);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_reflects_only_latest_run() {
        let scheduler = TaskScheduler::new("test");
        let (_runs, f) = scripted(vec![true, false, true, false]);

        let task = ScraperTask::create_and_start_with_delays(
            &scheduler,
            "flapping",
            FixedDelay::new(Duration::from_secs(10)),
            f,
        )
        .await;

        // Runs at 0s, 10s, 20s, 30s, 40s; observe between them
        let mut observed = vec![task.check().is_healthy()];
        sleep(Duration::from_secs(5)).await;
        observed.push(task.check().is_healthy());
        for _ in 0..4 {
            sleep(Duration::from_secs(10)).await;
            observed.push(task.check().is_healthy());
        }

        assert_eq!(observed, vec![true, true, false, true, false, true]);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_action_is_contained() {
        let scheduler = TaskScheduler::new("test");
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let task = ScraperTask::create_and_start_with_delays(
            &scheduler,
            "panics",
            FixedDelay::new(Duration::from_secs(1)),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 100 {
                        panic!("scraper blew up");
                    }
                    anyhow::Ok(())
                }
            },
        )
        .await;

        assert!(!task.check().is_healthy());
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_never_overlap() {
        let scheduler = TaskScheduler::new("test");
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let (current, max, count) = (in_flight.clone(), max_in_flight.clone(), runs.clone());
        let _task = ScraperTask::create_and_start(
            &scheduler,
            "slow",
            Duration::from_millis(100),
            move || {
                let (current, max, count) = (current.clone(), max.clone(), count.clone());
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    max.fetch_max(now, Ordering::SeqCst);
                    // Much slower than the period
                    sleep(Duration::from_secs(1)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    count.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            },
        )
        .await;

        sleep(Duration::from_secs(20)).await;
        scheduler.shutdown().await;

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(runs.load(Ordering::SeqCst) >= 10);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_in_flight_run_finish() {
        let scheduler = TaskScheduler::new("test");
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        let (s, f) = (started.clone(), finished.clone());
        let _task = ScraperTask::create_and_start_with_delays(
            &scheduler,
            "long-run",
            FixedDelay::new(Duration::from_secs(1)),
            move || {
                let (s, f) = (s.clone(), f.clone());
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    sleep(Duration::from_secs(5)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            },
        )
        .await;
        // Eager run took 5s of virtual time
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        // Second run starts at +1s and is in flight at +3s
        sleep(Duration::from_secs(3)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }
}

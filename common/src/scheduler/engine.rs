// Scheduler engine: runs task loops and stops them on shutdown

use super::delay::{DelayStrategy, FixedDelay};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Future returned by a task action
pub type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Shared, re-invocable unit of scheduled work
pub type Action = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Wrap an async closure as an [`Action`]
pub fn action<F, Fut>(f: F) -> Action
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Run an action once, turning a panic into an error
pub(crate) async fn run_action(action: &Action) -> anyhow::Result<()> {
    match AssertUnwindSafe(async { action().await }).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow::anyhow!(
            "task panicked: {}",
            panic_message(panic.as_ref())
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Callback receiving the outcome of every run
pub(crate) type OutcomeHandler = Box<dyn Fn(&anyhow::Result<()>) + Send + Sync>;

/// Everything one task loop needs
pub(crate) struct TaskLoop {
    pub name: String,
    pub action: Action,
    pub delays: Box<dyn DelayStrategy>,
    pub first_delay: Duration,
    pub on_outcome: OutcomeHandler,
}

/// A named family of scheduled tasks sharing one shutdown signal
///
/// Every task runs in its own loop, so a slow run only delays that task.
/// Within a task, a run always completes before the next delay starts.
pub struct TaskScheduler {
    name: String,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(name: impl Into<String>) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            name: name.into(),
            shutdown_tx,
            shut_down: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Number of task loops started on this scheduler
    pub async fn task_count(&self) -> usize {
        self.handles.lock().await.len()
    }

    /// Run `action` after `initial_delay`, then again `delay` after each run completes
    ///
    /// Failures are logged and never stop the loop.
    pub async fn schedule_with_fixed_delay<F, Fut>(
        &self,
        name: impl Into<String>,
        initial_delay: Duration,
        delay: Duration,
        f: F,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let task_name = name.clone();
        self.spawn(TaskLoop {
            name,
            action: action(f),
            delays: Box::new(FixedDelay::new(delay)),
            first_delay: initial_delay,
            on_outcome: Box::new(move |outcome| {
                if let Err(e) = outcome {
                    error!(task = %task_name, error = %format!("{:#}", e), "Scheduled task failed");
                }
            }),
        })
        .await;
    }

    /// Start a task loop on this scheduler
    pub(crate) async fn spawn(&self, task: TaskLoop) {
        // Held until the handle is pushed so shutdown cannot slip in between
        let mut handles = self.handles.lock().await;
        if self.is_shut_down() {
            warn!(
                scheduler = %self.name,
                task = %task.name,
                "Scheduler already shut down, task not started"
            );
            return;
        }

        debug!(
            scheduler = %self.name,
            task = %task.name,
            first_delay_ms = task.first_delay.as_millis() as u64,
            "Starting task loop"
        );

        let shutdown_rx = self.shutdown_tx.subscribe();
        handles.push(tokio::spawn(run_loop(task, shutdown_rx)));
    }

    /// Stop scheduling further runs and wait for every loop to exit
    ///
    /// Runs already in progress are allowed to finish.
    #[instrument(skip(self), fields(scheduler = %self.name))]
    pub async fn shutdown(&self) {
        info!("Stopping scheduler");

        let handles: Vec<JoinHandle<()>> = {
            let mut handles = self.handles.lock().await;
            self.shut_down.store(true, Ordering::Release);

            // Err only means no loop is listening
            let _ = self.shutdown_tx.send(());
            handles.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Task loop ended abnormally");
            }
        }

        info!("Scheduler stopped");
    }
}

async fn run_loop(task: TaskLoop, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut delay = task.first_delay;

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!(task = %task.name, "Shutdown signal received, task loop exiting");
                break;
            }
            _ = sleep(delay) => {}
        }

        let outcome = run_action(&task.action).await;
        (task.on_outcome)(&outcome);

        delay = task.delays.next_delay();
        debug!(
            task = %task.name,
            next_run_in_ms = delay.as_millis() as u64,
            "Next run scheduled"
        );
    }
}

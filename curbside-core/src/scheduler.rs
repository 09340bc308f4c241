//! Repeating-task abstraction supplied by the hosting environment.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Boxed future produced by one run of a repeating job.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Job invoked once per period.
pub type RepeatingJob = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Shortest period a scheduler accepts; zero would spin.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a scheduled job.
pub trait ScheduledTask: Send + Sync {
    /// Stop the job. A run that is in flight is dropped at its next await point.
    fn cancel(&self);

    /// Whether the job has stopped.
    fn is_finished(&self) -> bool;
}

/// Runs a job at a fixed period without overlapping runs.
pub trait Scheduler: Send + Sync {
    /// Start `job`, first invoked one `period` from now.
    fn schedule_repeating(&self, period: Duration, job: RepeatingJob) -> Box<dyn ScheduledTask>;
}

/// [`Scheduler`] backed by a tokio interval on the current runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, period: Duration, job: RepeatingJob) -> Box<dyn ScheduledTask> {
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            // a slow run pushes the next tick back instead of bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                job().await;
            }
        });
        Box::new(TokioTask(handle))
    }
}

struct TokioTask(JoinHandle<()>);

impl ScheduledTask for TokioTask {
    fn cancel(&self) {
        self.0.abort();
    }

    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

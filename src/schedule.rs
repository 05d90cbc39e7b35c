//! Fixed-interval scheduling of the health-check task.
//!
//! The scheduler fires once at startup and then on every interval tick.
//! Invocations run one at a time; a tick that comes due while a run is still
//! in flight is delayed rather than stacked. A failed invocation is logged
//! and recorded, and the loop waits for the next firing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::error::TaskError;
use crate::task::{HealthcheckTask, RunContext, RunOutcome};

/// Recurring trigger at a fixed rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    interval: Duration,
}

impl Schedule {
    /// Fire every `interval`
    pub fn every(interval: Duration) -> Self {
        Self { interval }
    }

    /// Fire every `minutes` minutes; saturates instead of overflowing
    pub fn rate_of_minutes(minutes: u64) -> Self {
        Self::every(Duration::from_secs(minutes.saturating_mul(60)))
    }

    /// Time between firings
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Summary of the most recent invocation
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub fired_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub is_test: bool,
    pub status: Option<u16>,
    pub ok: Option<bool>,
    pub notified: bool,
    pub error: Option<String>,
}

impl RunRecord {
    fn new(ctx: &RunContext, result: &Result<RunOutcome, TaskError>) -> Self {
        let (status, ok, notified, error) = match result {
            Ok(outcome) => (
                outcome.response.status,
                Some(outcome.response.ok),
                outcome.notified,
                None,
            ),
            Err(e) => (None, None, false, Some(e.to_string())),
        };

        Self {
            run_id: ctx.run_id,
            fired_at: ctx.fired_at,
            finished_at: Utc::now(),
            is_test: ctx.is_test,
            status,
            ok,
            notified,
            error,
        }
    }
}

/// Last run shared with the status endpoint
pub type LastRun = Arc<RwLock<Option<RunRecord>>>;

/// Drives a [`HealthcheckTask`] on its schedule and keeps the last run
pub struct Scheduler {
    task: HealthcheckTask,
    last_run: LastRun,
}

impl Scheduler {
    /// Wrap a task; no run is recorded until the first firing
    pub fn new(task: HealthcheckTask) -> Self {
        Self {
            task,
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    /// The scheduled task
    pub fn task(&self) -> &HealthcheckTask {
        &self.task
    }

    /// Shared handle to the most recent run record
    pub fn last_run(&self) -> LastRun {
        self.last_run.clone()
    }

    /// Single invocation, recorded like a scheduled one
    pub async fn run_once(&self, is_test: bool) -> Result<RunOutcome, TaskError> {
        let ctx = RunContext::new(is_test);
        let result = self.task.run(&ctx).await;

        match &result {
            Ok(outcome) => tracing::info!(
                run_id = %ctx.run_id,
                status = ?outcome.response.status,
                ok = outcome.response.ok,
                notified = outcome.notified,
                "Run completed"
            ),
            Err(e) => tracing::error!(run_id = %ctx.run_id, error = %e, "Run failed"),
        }

        *self.last_run.write().await = Some(RunRecord::new(&ctx, &result));
        result
    }

    /// Fire on schedule until `shutdown` resolves. Shutdown is only observed
    /// between invocations.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let interval = self.task.schedule().interval();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            trigger = self.task.id(),
            name = self.task.name(),
            interval_secs = interval.as_secs(),
            "Schedule started"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Schedule stopped");
                    return;
                }
                _ = ticker.tick() => {
                    // Failures are already logged and recorded
                    let _ = self.run_once(false).await;
                }
            }
        }
    }
}

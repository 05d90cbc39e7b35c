//! The health-check task.
//!
//! Each invocation fetches the target URL once with retries disabled and
//! posts a Slack message when the site is down or the run is a test run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::config::{NOTIFY_CHANNEL_NAME, TRIGGER_ID, TRIGGER_NAME};
use crate::error::TaskError;
use crate::fetch::{FetchRequest, FetchResponse, Fetcher, RetryPolicy};
use crate::schedule::Schedule;
use crate::slack::{Notifier, PostMessage};

/// Per-invocation context supplied by the invoker
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub trigger_id: &'static str,
    /// Forces a notification regardless of the fetch outcome
    pub is_test: bool,
    pub fired_at: DateTime<Utc>,
}

impl RunContext {
    /// Fresh run ID, fired now
    pub fn new(is_test: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trigger_id: TRIGGER_ID,
            is_test,
            fired_at: Utc::now(),
        }
    }
}

/// Result of a completed invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub response: FetchResponse,
    pub notified: bool,
}

/// Text posted when the site is down
pub fn down_message(url: &str) -> String {
    format!("😭 {} is down!", url)
}

/// The scheduled health check bound to one URL
#[derive(Clone)]
pub struct HealthcheckTask {
    url: String,
    schedule: Schedule,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
}

impl HealthcheckTask {
    /// Bind the task to `url`, its schedule and both capabilities
    pub fn new(
        url: impl Into<String>,
        schedule: Schedule,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            url: url.into(),
            schedule,
            fetcher,
            notifier,
        }
    }

    /// Stable trigger identifier
    pub fn id(&self) -> &'static str {
        TRIGGER_ID
    }

    /// Human-readable trigger name
    pub fn name(&self) -> &'static str {
        TRIGGER_NAME
    }

    /// URL fetched on every run
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Firing schedule
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Fetch the URL once with retries disabled, then notify if the site is
    /// down or this is a test run. Capability errors propagate.
    #[instrument(
        name = "healthcheck.run",
        skip(self, ctx),
        fields(run_id = %ctx.run_id, is_test = ctx.is_test, url = %self.url)
    )]
    pub async fn run(&self, ctx: &RunContext) -> Result<RunOutcome, TaskError> {
        let request = FetchRequest::get(&self.url).with_retry(RetryPolicy::disabled());
        let response = self.fetcher.fetch(&request).await?;

        if response.ok && !ctx.is_test {
            tracing::debug!(status = ?response.status, "Website is up");
            return Ok(RunOutcome {
                response,
                notified: false,
            });
        }

        if response.ok {
            tracing::info!(status = ?response.status, "Test run, sending notification");
        } else {
            tracing::warn!(status = ?response.status, "Website is down, sending notification");
        }

        let message = PostMessage {
            channel_name: NOTIFY_CHANNEL_NAME.to_string(),
            text: down_message(&self.url),
        };
        self.notifier.post_message(&message).await?;

        Ok(RunOutcome {
            response,
            notified: true,
        })
    }
}

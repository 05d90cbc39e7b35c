//! Scheduled Healthcheck
//!
//! Fetches a website on a fixed schedule and posts a Slack message when it
//! does not answer with a successful status, or when a run is flagged as a
//! test run.

pub mod config;
pub mod error;
pub mod fetch;
pub mod middleware;
pub mod schedule;
pub mod shutdown;
pub mod slack;
pub mod status;
pub mod task;

pub use error::TaskError;
pub use schedule::{Schedule, Scheduler};
pub use task::{HealthcheckTask, RunContext, RunOutcome};

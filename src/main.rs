//! Scheduled Healthcheck entry point.
//!
//! Initializes tracing, loads configuration, builds the fetch and Slack
//! clients, then either runs a single invocation (`--once`, `--test`) or
//! fires the health check on its schedule until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scheduled_healthcheck::config::{
    AppConfig, ConfigSource, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER,
};
use scheduled_healthcheck::fetch::HttpFetcher;
use scheduled_healthcheck::shutdown::Shutdown;
use scheduled_healthcheck::slack::SlackClient;
use scheduled_healthcheck::status::{self, StatusState};
use scheduled_healthcheck::{HealthcheckTask, Schedule, Scheduler};

/// Scheduled Healthcheck: fetch a website on a schedule and report outages to Slack
#[derive(Parser, Debug)]
#[command(name = "scheduled-healthcheck", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "scheduled_healthcheck=debug")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single invocation and exit
    #[arg(long, conflicts_with = "test")]
    once: bool,

    /// Run a single test invocation (always notifies) and exit
    #[arg(long)]
    test: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration first so the log format is known
    let (config, source) = AppConfig::load_or_default(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if source == ConfigSource::Defaults {
        tracing::info!(path = %args.config, "No config file, using defaults");
    }

    tracing::info!(
        url = %config.target.url,
        interval_minutes = config.schedule.interval_minutes,
        status_enabled = config.status.enabled,
        "Loaded configuration"
    );

    let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch.timeout_seconds))?;
    let notifier = SlackClient::new(
        config.slack.api_base.clone(),
        config.require_slack_token()?,
        Duration::from_secs(config.slack.timeout_seconds),
    )?;

    let task = HealthcheckTask::new(
        config.target.url.clone(),
        Schedule::rate_of_minutes(config.schedule.interval_minutes),
        Arc::new(fetcher),
        Arc::new(notifier),
    );
    let scheduler = Scheduler::new(task);

    if args.once || args.test {
        let outcome = scheduler.run_once(args.test).await?;
        tracing::info!(notified = outcome.notified, "Single run finished");
        return Ok(());
    }

    let shutdown = Shutdown::listen();

    if config.status.enabled {
        let state = StatusState::from_scheduler(&scheduler);
        let host = config.status.host.clone();
        let port = config.status.port;
        let stop = shutdown.clone().wait();
        tokio::spawn(async move {
            if let Err(e) = status::serve(state, &host, port, stop).await {
                tracing::error!(error = %e, "Status endpoint stopped");
            }
        });
    }

    scheduler.run_until(shutdown.wait()).await;

    Ok(())
}

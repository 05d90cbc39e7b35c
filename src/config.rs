//! Configuration loading and constants.
//!
//! Loads application configuration from an optional TOML file, applies
//! environment overrides (`WEBSITE_URL`, `SLACK_TOKEN`) and defines the fixed
//! identity of the health-check trigger. `AppConfig` is the root configuration
//! struct containing all settings.

use const_format::formatcp;
use serde::Deserialize;
use std::path::Path;

// =============================================================================
// Trigger Identity
// =============================================================================

/// Stable trigger identifier
pub const TRIGGER_ID: &str = "scheduled-healthcheck";

/// Human-readable trigger name
pub const TRIGGER_NAME: &str = "Scheduled Healthcheck";

/// Slack channel that receives down notifications
pub const NOTIFY_CHANNEL_NAME: &str = "website-health-check";

// =============================================================================
// Target and Schedule
// =============================================================================

/// Environment variable holding the URL to check
pub const WEBSITE_URL_ENV: &str = "WEBSITE_URL";

/// URL checked when neither the environment nor the config file sets one
pub const DEFAULT_WEBSITE_URL: &str = "https://trigger.dev";

/// Minutes between scheduled checks
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Longest accepted interval (one week)
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

// =============================================================================
// Fetch Capability
// =============================================================================

/// Per-request timeout for the site fetch
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default attempts when a caller enables retries
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// First backoff delay in milliseconds
pub const DEFAULT_RETRY_MIN_DELAY_MS: u64 = 1000;

/// Backoff ceiling in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Backoff growth factor
pub const DEFAULT_RETRY_FACTOR: f64 = 2.0;

/// User-Agent sent with the site fetch and Slack calls
pub const USER_AGENT: &str = formatcp!("{}/{}", TRIGGER_ID, env!("CARGO_PKG_VERSION"));

// =============================================================================
// Slack
// =============================================================================

/// Environment variable holding the Slack bot token
pub const SLACK_TOKEN_ENV: &str = "SLACK_TOKEN";

/// Slack Web API base URL
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Timeout for Slack API calls
pub const DEFAULT_SLACK_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Status Endpoint, Logging and Paths
// =============================================================================

/// Status listener bind address
pub const DEFAULT_STATUS_HOST: &str = "127.0.0.1";
/// Status listener port
pub const DEFAULT_STATUS_PORT: u16 = 8080;

/// Default configuration file path (optional; defaults apply if it is absent)
pub const DEFAULT_CONFIG_PATH: &str = "config/healthcheck.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "scheduled_healthcheck=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Website being checked
    #[serde(default)]
    pub target: TargetConfig,
    /// Firing interval
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Site fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Slack Web API settings
    #[serde(default)]
    pub slack: SlackConfig,
    /// Optional liveness/status listener
    #[serde(default)]
    pub status: StatusConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "TargetConfig::default_url")]
    pub url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
        }
    }
}

impl TargetConfig {
    fn default_url() -> String {
        DEFAULT_WEBSITE_URL.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "ScheduleConfig::default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: Self::default_interval_minutes(),
        }
    }
}

impl ScheduleConfig {
    fn default_interval_minutes() -> u64 {
        DEFAULT_INTERVAL_MINUTES
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "FetchConfig::default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: Self::default_timeout(),
        }
    }
}

impl FetchConfig {
    fn default_timeout() -> u64 {
        DEFAULT_FETCH_TIMEOUT_SECS
    }
}

#[derive(Clone, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`). `SLACK_TOKEN` takes precedence.
    pub token: Option<String>,
    #[serde(default = "SlackConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "SlackConfig::default_timeout")]
    pub timeout_seconds: u64,
}

// Keep the token out of logs
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: Self::default_api_base(),
            timeout_seconds: Self::default_timeout(),
        }
    }
}

impl SlackConfig {
    fn default_api_base() -> String {
        DEFAULT_SLACK_API_BASE.to_string()
    }

    fn default_timeout() -> u64 {
        DEFAULT_SLACK_TIMEOUT_SECS
    }
}

/// Status listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "StatusConfig::default_host")]
    pub host: String,
    #[serde(default = "StatusConfig::default_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl StatusConfig {
    fn default_host() -> String {
        DEFAULT_STATUS_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_STATUS_PORT
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    /// Whether structured JSON output is selected
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file, then apply
    /// environment overrides from the process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&contents)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file at the default path falls
    /// back to built-in defaults. An explicitly given path must exist.
    ///
    /// Returns where the settings came from so the caller can log it once
    /// tracing is up.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource), ConfigError> {
        let path = path.as_ref();
        if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
            let mut config = AppConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            config.validate()?;
            return Ok((config, ConfigSource::Defaults));
        }
        Ok((Self::load(path)?, ConfigSource::File))
    }

    /// Apply environment overrides. Set-but-empty variables count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = non_empty(WEBSITE_URL_ENV) {
            self.target.url = url;
        }
        if let Some(token) = non_empty(SLACK_TOKEN_ENV) {
            self.slack.token = Some(token);
        }
    }

    /// Reject values the scheduler or fetcher cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Whitespace is kept verbatim; only a truly empty URL is rejected
        if self.target.url.is_empty() {
            return Err(ConfigError::Validation(
                "target.url must not be empty".to_string(),
            ));
        }
        if self.schedule.interval_minutes == 0 {
            return Err(ConfigError::Validation(
                "schedule.interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.schedule.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(ConfigError::Validation(format!(
                "schedule.interval_minutes must be at most {}",
                MAX_INTERVAL_MINUTES
            )));
        }
        if self.fetch.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Slack token, or a validation error naming both places it can be set
    pub fn require_slack_token(&self) -> Result<&str, ConfigError> {
        self.slack
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "No Slack token configured. Set {} or [slack] token",
                    SLACK_TOKEN_ENV
                ))
            })
    }
}

/// Origin of a loaded configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the TOML file
    File,
    /// Default path missing; built-in defaults plus environment
    Defaults,
}

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_use_literal_url() {
        let mut config = AppConfig::default();
        config.apply_env(|_| None);
        assert_eq!(config.target.url, "https://trigger.dev");
        assert_eq!(config.schedule.interval_minutes, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_website_url_env_used_verbatim() {
        let vars = env(&[(WEBSITE_URL_ENV, "https://example.com")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.target.url, "https://example.com");
    }

    #[test]
    fn test_website_url_env_overrides_file() {
        let mut config: AppConfig =
            toml::from_str("[target]\nurl = \"https://from-file.example\"\n").unwrap();
        assert_eq!(config.target.url, "https://from-file.example");

        let vars = env(&[(WEBSITE_URL_ENV, "https://from-env.example/path?q=1")]);
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.target.url, "https://from-env.example/path?q=1");
    }

    #[test]
    fn test_empty_env_counts_as_unset() {
        let vars = env(&[(WEBSITE_URL_ENV, ""), (SLACK_TOKEN_ENV, "")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.target.url, DEFAULT_WEBSITE_URL);
        assert!(config.slack.token.is_none());
    }

    #[test]
    fn test_slack_token_required() {
        let config = AppConfig::default();
        assert!(matches!(
            config.require_slack_token(),
            Err(ConfigError::Validation(_))
        ));

        let vars = env(&[(SLACK_TOKEN_ENV, "xoxb-test")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.require_slack_token().unwrap(), "xoxb-test");
    }

    #[test]
    fn test_slack_debug_redacts_token() {
        let mut config = SlackConfig::default();
        config.token = Some("xoxb-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("xoxb-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config: AppConfig = toml::from_str("[schedule]\ninterval_minutes = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_huge_interval() {
        let config: AppConfig =
            toml::from_str("[schedule]\ninterval_minutes = 9223372036854775807\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config: AppConfig = toml::from_str(&format!(
            "[schedule]\ninterval_minutes = {}\n",
            MAX_INTERVAL_MINUTES
        ))
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_whitespace_env_url_kept_verbatim() {
        let vars = env(&[(WEBSITE_URL_ENV, "  https://example.com ")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.target.url, "  https://example.com ");
        assert!(config.validate().is_ok());

        let vars = env(&[(WEBSITE_URL_ENV, "   ")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.target.url, "   ");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default_reports_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[schedule]\ninterval_minutes = 2").unwrap();

        let (config, source) = AppConfig::load_or_default(file.path()).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.schedule.interval_minutes, 2);
    }

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[target]
url = "https://status.example.org"

[schedule]
interval_minutes = 1

[fetch]
timeout_seconds = 5

[slack]
token = "xoxb-file"
api_base = "http://127.0.0.1:9999/api"

[status]
enabled = true
port = 9090

[logging]
format = "json"
"#
        )
        .unwrap();

        let config: AppConfig =
            toml::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.target.url, "https://status.example.org");
        assert_eq!(config.schedule.interval_minutes, 1);
        assert_eq!(config.fetch.timeout_seconds, 5);
        assert_eq!(config.slack.token.as_deref(), Some("xoxb-file"));
        assert_eq!(config.slack.api_base, "http://127.0.0.1:9999/api");
        assert!(config.status.enabled);
        assert_eq!(config.status.host, DEFAULT_STATUS_HOST);
        assert_eq!(config.status.port, 9090);
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[target\nurl = ").unwrap();
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load_or_default(&missing),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_user_agent_includes_trigger_id() {
        assert!(USER_AGENT.starts_with("scheduled-healthcheck/"));
    }
}

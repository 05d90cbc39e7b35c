//! Slack notification capability.
//!
//! Posts a plain text message to a channel through the Web API
//! `chat.postMessage` method using a bot token.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::USER_AGENT;

/// Failure to deliver a message
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to reach Slack: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Slack returned HTTP status {0}")]
    Status(u16),

    #[error("Slack API error: {0}")]
    Api(String),

    #[error("Unreadable Slack response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to create Slack client: {0}")]
    Client(String),
}

/// A message for one channel, addressed by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub channel_name: String,
    pub text: String,
}

/// Capability to post a chat message
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, message: &PostMessage) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct ChatPostMessage<'a> {
    channel: String,
    text: &'a str,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    error: Option<String>,
}

/// Slack Web API client
#[derive(Clone)]
pub struct SlackClient {
    http_client: reqwest::Client,
    api_base: String,
    token: String,
}

impl SlackClient {
    /// Build a client for `api_base` (e.g. `https://slack.com/api`) using a bot token
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: api_base.into(),
            token: token.into(),
        })
    }

    fn endpoint(&self, api_method: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), api_method)
    }
}

#[async_trait]
impl Notifier for SlackClient {
    #[instrument(name = "slack.post_message", skip(self, message), fields(channel = %message.channel_name))]
    async fn post_message(&self, message: &PostMessage) -> Result<(), NotifyError> {
        let body = ChatPostMessage {
            channel: format!("#{}", message.channel_name.trim_start_matches('#')),
            text: &message.text,
        };

        let response = self
            .http_client
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        // Slack reports most failures with HTTP 200 and ok=false
        let body = response.bytes().await?;
        let reply: SlackResponse = serde_json::from_slice(&body)?;
        if !reply.ok {
            return Err(NotifyError::Api(
                reply.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        tracing::info!("Posted Slack message");
        Ok(())
    }
}

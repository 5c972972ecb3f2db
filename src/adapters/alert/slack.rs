//! Slack alert sink
//!
//! Posts to the Web API's `chat.postMessage` method. Slack answers HTTP 200
//! for most failures and reports them through the `ok` field, so both the
//! status and the body are checked.

use super::AlertSink;
use crate::config::SecretString;
use crate::domain::{Result, SurgeError};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SlackAlertSink {
    client: Client,
    token: SecretString,
    channel: String,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

impl SlackAlertSink {
    pub fn new(token: SecretString, channel: String, api_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SurgeError::Alert(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token,
            channel,
            api_url,
        })
    }
}

#[async_trait]
impl AlertSink for SlackAlertSink {
    fn name(&self) -> &str {
        "slack"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let text = format!("*{subject}*\n```{body}```");
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(self.token.expose_secret().as_str())
            .json(&serde_json::json!({
                "channel": self.channel,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| SurgeError::Alert(format!("Slack request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SurgeError::Alert(format!(
                "Slack returned status {status}: {body}"
            )));
        }

        let reply: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| SurgeError::Alert(format!("Invalid Slack response: {e}")))?;
        if !reply.ok {
            return Err(SurgeError::Alert(format!(
                "Slack rejected message: {}",
                reply.error.as_deref().unwrap_or("unknown error")
            )));
        }

        tracing::info!(
            channel = %self.channel,
            ts = reply.ts.as_deref().unwrap_or_default(),
            "Slack alert sent"
        );
        Ok(())
    }
}

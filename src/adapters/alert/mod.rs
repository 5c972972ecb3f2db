//! Alert delivery
//!
//! Alerts are fire-and-forget: a sink that fails to deliver is logged and
//! the load carries on.

pub mod email;
pub mod log;
pub mod slack;

use crate::config::AlertsConfig;
use crate::domain::{Result, SurgeError};
use async_trait::async_trait;
use std::sync::Arc;

pub use self::log::LogAlertSink;
pub use email::EmailAlertSink;
pub use slack::SlackAlertSink;

/// A destination for operator alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}

/// Fans an alert out to every configured sink
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertDispatcher {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { sinks }
    }

    /// Build the sinks described by the `[alerts]` section
    ///
    /// Disabled alerting yields a dispatcher with no sinks. When enabled,
    /// alerts always reach the log; Slack is added once a token is set and
    /// email once a recipient is.
    pub fn from_config(config: &AlertsConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::default());
        }

        let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogAlertSink)];
        if let (Some(token), Some(channel)) = (&config.slack_token, &config.slack_channel) {
            sinks.push(Arc::new(SlackAlertSink::new(
                token.clone(),
                channel.clone(),
                config.slack_api_url.clone(),
            )?));
        }
        if let (Some(to), Some(server)) = (&config.email_to, &config.smtp_server) {
            let (host, port) = config
                .smtp_endpoint(server)
                .map_err(SurgeError::Configuration)?;
            let from = config.email_from.as_deref().unwrap_or(to);
            sinks.push(Arc::new(EmailAlertSink::new(to, from, &host, port)?));
        }
        Ok(Self { sinks })
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver an alert to every sink at once, logging failures
    pub async fn dispatch(&self, subject: &str, body: &str) {
        let deliveries = self.sinks.iter().map(|sink| async move {
            if let Err(e) = sink.notify(subject, body).await {
                tracing::warn!(
                    sink = sink.name(),
                    subject = subject,
                    error = %e,
                    "Failed to deliver alert"
                );
            }
        });
        futures::future::join_all(deliveries).await;
    }
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("sinks", &self.sink_names())
            .finish()
    }
}

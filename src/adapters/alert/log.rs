//! Alert sink that writes to the log

use super::AlertSink;
use crate::domain::Result;
use async_trait::async_trait;

/// Emits each alert as an `error` event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::error!(alert = true, subject = subject, body = body, "ALERT: {subject}");
        Ok(())
    }
}

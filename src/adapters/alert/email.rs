//! Email alert sink
//!
//! Plain SMTP relay delivery through `lettre`, unauthenticated and
//! unencrypted, as internal mail relays usually expect.

use super::AlertSink;
use crate::domain::{Result, SurgeError};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EmailAlertSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    relay: String,
}

impl EmailAlertSink {
    /// Create a sink sending from `from` to `to` through `host:port`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either address doesn't parse.
    pub fn new(to: &str, from: &str, host: &str, port: u16) -> Result<Self> {
        let to = parse_mailbox("email_to", to)?;
        let from = parse_mailbox("email_from", from)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        Ok(Self {
            transport,
            from,
            to,
            relay: format!("{host}:{port}"),
        })
    }
}

fn parse_mailbox(key: &str, address: &str) -> Result<Mailbox> {
    address.trim().parse().map_err(|e| {
        SurgeError::Configuration(format!("alerts.{key} '{address}' is invalid: {e}"))
    })
}

#[async_trait]
impl AlertSink for EmailAlertSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| SurgeError::Alert(format!("Failed to build alert email: {e}")))?;

        tokio::time::timeout(SEND_TIMEOUT, self.transport.send(message))
            .await
            .map_err(|_| {
                SurgeError::Alert(format!(
                    "SMTP relay {} did not answer within {}s",
                    self.relay,
                    SEND_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| SurgeError::Alert(format!("SMTP relay {} failed: {e}", self.relay)))?;

        tracing::info!(to = %self.to, relay = %self.relay, "Alert email sent");
        Ok(())
    }
}

//! Outbound SMS notifications through a Twilio-compatible HTTP API.
//!
//! Fire-and-forget: the controller consumes no delivery status beyond the
//! HTTP response code. With no `[sms]` block configured, sends are logged
//! and skipped.

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::SmsSection;

pub struct SmsClient {
    http: reqwest::Client,
    settings: Option<SmsSection>,
}

impl SmsClient {
    pub fn new(settings: Option<SmsSection>) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    /// Send `body` to the configured recipient.
    pub async fn send(&self, body: &str) -> Result<()> {
        let Some(cfg) = &self.settings else {
            debug!("sms disabled — not sending: {body}");
            return Ok(());
        };

        let url = message_endpoint(&cfg.api_url, &cfg.account_sid);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&cfg.account_sid, Some(&cfg.auth_token))
            .form(&[
                ("To", cfg.to.as_str()),
                ("From", cfg.from.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .context("sms request failed")?;

        if !resp.status().is_success() {
            bail!("sms rejected: http {}", resp.status());
        }
        info!(to = %cfg.to, "sms sent");
        Ok(())
    }
}

/// Message-create endpoint for an account, Twilio path layout.
fn message_endpoint(api_url: &str, account_sid: &str) -> String {
    format!(
        "{}/Accounts/{}/Messages.json",
        api_url.trim_end_matches('/'),
        account_sid
    )
}

// ===========================================================================
// Tests
// ===========================================================================

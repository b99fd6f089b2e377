use crate::config::TwilioConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;
use tracing::{info, warn};

/// Places outbound calls through the telephony provider.
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// Dial `to`; the provider fetches call instructions from `answer_url`.
    /// Returns the provider's call id.
    async fn place_call(&self, to: &str, answer_url: &str, status_url: &str) -> Result<String>;
}

pub struct TwilioClient {
    client: Client,
    config: TwilioConfig,
}

#[derive(Debug, Deserialize)]
struct CreateCallResponse {
    sid: Option<String>,
    message: Option<String>,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Calls.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl TelephonyClient for TwilioClient {
    async fn place_call(&self, to: &str, answer_url: &str, status_url: &str) -> Result<String> {
        let start_time = Instant::now();
        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Url", answer_url),
                ("Method", "POST"),
                ("StatusCallback", status_url),
                ("StatusCallbackMethod", "POST"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: CreateCallResponse = response
            .json()
            .await
            .unwrap_or(CreateCallResponse {
                sid: None,
                message: None,
            });
        info!(
            to,
            elapsed = start_time.elapsed().as_millis() as u64,
            status = ?status,
            "place call"
        );

        if !status.is_success() {
            let message = body.message.unwrap_or_else(|| status.to_string());
            warn!(to, "provider rejected call: {}", message);
            return Err(anyhow!("failed to place call: {}", message));
        }
        body.sid
            .ok_or_else(|| anyhow!("provider response missing call sid"))
    }
}

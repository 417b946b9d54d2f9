//! Carrier HTTP client.

use crate::error::SmsError;
use crate::sender::MessageSender;
use crate::types::*;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Client for a carrier's REST messaging API.
#[derive(Clone)]
pub struct SmsClient {
    client: Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl SmsClient {
    /// Create a new carrier client.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, SmsError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the carrier API is healthy.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/v1/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Send a text message from one of our numbers.
    #[instrument(skip(self, text))]
    pub async fn send_sms(&self, from: &str, to: &str, text: &str) -> Result<(), SmsError> {
        let request = SendSmsRequest {
            from: from.to_string(),
            to: to.to_string(),
            text: text.to_string(),
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let msg = response.text().await.unwrap_or_default();
            warn!(status = %status, "Send failed: {}", msg);
            return Err(SmsError::SendFailed(format!("{} - {}", status, msg)));
        }

        let carrier_id = response
            .json::<SendSmsResponse>()
            .await
            .ok()
            .and_then(|r| r.id);
        debug!(
            carrier_id = carrier_id.as_deref().unwrap_or("none"),
            "Sent message"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageSender for SmsClient {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<(), SmsError> {
        self.send_sms(from, to, body).await
    }

    async fn health_check(&self) -> bool {
        SmsClient::health_check(self).await
    }
}

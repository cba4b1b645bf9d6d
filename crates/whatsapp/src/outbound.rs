use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use selma_agent::pipeline::{DeliveryError, OutboundTransport};
use selma_core::config::TwilioConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const SEND_TIMEOUT_SECS: u64 = 30;

/// Outbound WhatsApp delivery through the Twilio Messages API.
pub struct TwilioMessageSender {
    http: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: SecretString,
    sender_address: String,
}

impl TwilioMessageSender {
    pub fn from_config(config: &TwilioConfig) -> Result<Self, DeliveryError> {
        Self::with_api_base(config, TWILIO_API_BASE)
    }

    pub fn with_api_base(config: &TwilioConfig, api_base: &str) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .map_err(|error| DeliveryError::Send(error.to_string()))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            sender_address: config.sender_address.clone(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.api_base, self.account_sid)
    }
}

#[async_trait]
impl OutboundTransport for TwilioMessageSender {
    async fn deliver(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        let params = [("From", self.sender_address.as_str()), ("To", to), ("Body", body)];

        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|error| DeliveryError::Send(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                event_name = "twilio.delivery_rejected",
                status = status.as_u16(),
                to,
                "twilio rejected the outbound message"
            );
            return Err(DeliveryError::Rejected { status: status.as_u16(), message });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use selma_core::config::TwilioConfig;

    use super::TwilioMessageSender;

    fn config() -> TwilioConfig {
        TwilioConfig {
            account_sid: "ACtest0000000000000000000000000000".to_string(),
            auth_token: SecretString::from("token-test".to_string()),
            sender_address: "whatsapp:+14155238886".to_string(),
        }
    }

    #[test]
    fn messages_url_targets_the_account_scoped_endpoint() {
        let sender = TwilioMessageSender::with_api_base(&config(), "https://api.twilio.com/")
            .expect("client should build");

        assert_eq!(
            sender.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/ACtest0000000000000000000000000000/Messages.json"
        );
    }
}

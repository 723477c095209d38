//! SMS provider client.
//!
//! Messages are posted as JSON and signed with HMAC-SHA256 so the provider
//! can reject forged requests. When no provider URL is configured the client
//! is disabled and messages are only logged.

use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::{config::Config, error::AppError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct SmsMessage<'a> {
    to: &'a str,
    body: &'a str,
}

#[derive(Debug, Clone)]
struct SmsTransport {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    signing_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmsClient {
    transport: Option<SmsTransport>,
}

impl SmsClient {
    /// A client that never calls out.
    pub fn disabled() -> Self {
        Self { transport: None }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let Some(ref base_url) = config.sms_api_url else {
            return Ok(Self::disabled());
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            transport: Some(SmsTransport {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: config.sms_api_key.clone(),
                signing_secret: config.sms_signing_secret.clone(),
            }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Send one message.
    ///
    /// # Headers Sent
    ///
    /// - `Content-Type: application/json`
    /// - `Authorization: Bearer <api key>` when configured
    /// - `X-Signature: sha256=<hex>` when a signing secret is configured
    pub async fn send(&self, to: &str, body: &str) -> Result<(), AppError> {
        let Some(ref transport) = self.transport else {
            tracing::info!("SMS disabled, not sending to {}: {}", mask_phone(to), body);
            return Ok(());
        };

        let payload = serde_json::to_string(&SmsMessage { to, body })
            .map_err(|e| AppError::External(format!("failed to serialize SMS: {e}")))?;

        let mut request = transport
            .http
            .post(format!("{}/messages", transport.base_url))
            .header("Content-Type", "application/json");

        if let Some(ref api_key) = transport.api_key {
            request = request.bearer_auth(api_key);
        }
        if let Some(ref secret) = transport.signing_secret {
            request = request.header("X-Signature", sign_payload(secret, &payload)?);
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| AppError::External(format!("SMS provider unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "SMS provider returned HTTP {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }

    /// Send, logging instead of failing. Used for notifications that must
    /// not undo the operation that triggered them.
    pub async fn notify(&self, to: &str, body: &str) {
        if let Err(e) = self.send(to, body).await {
            tracing::error!("Failed to send SMS to {}: {}", mask_phone(to), e);
        }
    }
}

/// HMAC-SHA256 signature in the form `sha256=<hex>`.
pub fn sign_payload(secret: &str, payload: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Crypto(format!("invalid signing key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Keep only the last four digits for logs.
fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn phone_is_masked_in_logs() {
        assert_eq!(mask_phone("+447700900123"), "***0123");
        assert_eq!(mask_phone("12"), "***12");
    }

    #[tokio::test]
    async fn disabled_client_accepts_messages() {
        let client = SmsClient::disabled();
        assert!(!client.is_enabled());
        assert!(client.send("+15550001111", "hello").await.is_ok());
    }

    #[test]
    fn client_without_url_is_disabled() {
        let config = crate::config::test_config();
        assert!(!SmsClient::from_config(&config).unwrap().is_enabled());
    }
}

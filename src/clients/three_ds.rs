//! EMV 3-D Secure gateway client.
//!
//! Card verification runs a non-payment authentication against the gateway.
//! Only the card fingerprint leaves this service; the gateway resolves it to
//! the tokenized card on its side.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Request body for `POST {base_url}/authentications`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest<'a> {
    pub card_fingerprint: &'a str,
    pub card_brand: &'a str,
    pub cardholder_name: &'a str,
    /// "02" = non-payment authentication
    pub message_category: &'static str,
    pub purchase_amount: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationResponse {
    trans_status: String,
    ds_trans_id: Option<String>,
}

/// Result of a 3DS authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreeDsOutcome {
    /// `transStatus` Y (authenticated) or A (attempted)
    Authenticated { ds_trans_id: Option<String> },
    /// Any other `transStatus` (N, U, R, ...)
    Failed { trans_status: String },
}

impl ThreeDsOutcome {
    pub fn from_status(trans_status: &str, ds_trans_id: Option<String>) -> Self {
        match trans_status.trim().to_ascii_uppercase().as_str() {
            "Y" | "A" => ThreeDsOutcome::Authenticated { ds_trans_id },
            other => ThreeDsOutcome::Failed {
                trans_status: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThreeDsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ThreeDsClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Run a non-payment authentication for a stored card.
    ///
    /// # Errors
    ///
    /// `External` when the gateway is unreachable, answers with a non-2xx
    /// status, or returns a body that cannot be parsed. A declined
    /// authentication is not an error; it is `ThreeDsOutcome::Failed`.
    pub async fn authenticate(
        &self,
        request: &AuthenticationRequest<'_>,
    ) -> Result<ThreeDsOutcome, AppError> {
        let response = self
            .http
            .post(format!("{}/authentications", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::External(format!("3DS gateway unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::External(format!(
                "3DS gateway returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: AuthenticationResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("invalid 3DS response: {e}")))?;

        Ok(ThreeDsOutcome::from_status(&body.trans_status, body.ds_trans_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn y_and_a_count_as_authenticated() {
        assert_eq!(
            ThreeDsOutcome::from_status("Y", Some("ds-1".to_string())),
            ThreeDsOutcome::Authenticated {
                ds_trans_id: Some("ds-1".to_string())
            }
        );
        assert!(matches!(
            ThreeDsOutcome::from_status("a", None),
            ThreeDsOutcome::Authenticated { .. }
        ));
    }

    #[test]
    fn other_statuses_fail() {
        for status in ["N", "U", "R", "C", ""] {
            assert!(matches!(
                ThreeDsOutcome::from_status(status, None),
                ThreeDsOutcome::Failed { .. }
            ));
        }
    }

    #[test]
    fn request_uses_camel_case() {
        let request = AuthenticationRequest {
            card_fingerprint: "fp",
            card_brand: "visa",
            cardholder_name: "ADA",
            message_category: "02",
            purchase_amount: 0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["cardFingerprint"], "fp");
        assert_eq!(json["messageCategory"], "02");
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = ThreeDsClient::new("https://3ds.example/", "key").unwrap();
        assert_eq!(client.base_url, "https://3ds.example");
    }
}

//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DB_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `STATEMENT_MASTER_KEY` (required): 64 hex characters, root key for statement encryption
/// - `THREE_DS_API_URL` / `THREE_DS_API_KEY` (required): 3-D Secure gateway
/// - `SMS_API_URL` / `SMS_API_KEY` / `SMS_SIGNING_SECRET` (optional): SMS provider
/// - `LARGE_TRANSFER_THRESHOLD_CENTS` (optional): transfers at or above need approval
/// - `CREDIT_ANNUAL_RATE_BPS` (optional): annual rate used for installments
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    pub statement_master_key: String,

    pub three_ds_api_url: String,
    pub three_ds_api_key: String,

    #[serde(default)]
    pub sms_api_url: Option<String>,
    #[serde(default)]
    pub sms_api_key: Option<String>,
    #[serde(default)]
    pub sms_signing_secret: Option<String>,

    #[serde(default = "default_large_transfer_threshold")]
    pub large_transfer_threshold_cents: i64,

    #[serde(default = "default_credit_rate")]
    pub credit_annual_rate_bps: u32,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

/// 10,000.00 in the account currency.
fn default_large_transfer_threshold() -> i64 {
    1_000_000
}

/// 12.00 % per year.
fn default_credit_rate() -> u32 {
    1200
}

/// Problems found after the environment was parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("STATEMENT_MASTER_KEY must be 64 hex characters")]
    InvalidMasterKey,

    #[error("invalid URL in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("LARGE_TRANSFER_THRESHOLD_CENTS must be positive")]
    InvalidThreshold,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - Values parse but fail [`Config::validate`]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        let config = envy::from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.master_key()?;

        validate_url("THREE_DS_API_URL", &self.three_ds_api_url)?;
        if let Some(ref sms_url) = self.sms_api_url {
            validate_url("SMS_API_URL", sms_url)?;
        }

        if self.large_transfer_threshold_cents <= 0 {
            return Err(ConfigError::InvalidThreshold);
        }

        Ok(())
    }

    /// Decode the statement master key into raw bytes.
    pub fn master_key(&self) -> Result<[u8; 32], ConfigError> {
        let bytes =
            hex::decode(self.statement_master_key.trim()).map_err(|_| ConfigError::InvalidMasterKey)?;
        bytes.try_into().map_err(|_| ConfigError::InvalidMasterKey)
    }
}

fn validate_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/bank_test".to_string(),
        server_port: 3000,
        db_max_connections: 1,
        statement_master_key: "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff"
            .to_string(),
        three_ds_api_url: "http://localhost:9001".to_string(),
        three_ds_api_key: "test-3ds-key".to_string(),
        sms_api_url: None,
        sms_api_key: None,
        sms_signing_secret: None,
        large_transfer_threshold_cents: default_large_transfer_threshold(),
        credit_annual_rate_bps: default_credit_rate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes() {
        let config = test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.master_key().unwrap()[0], 0x00);
        assert_eq!(config.master_key().unwrap()[31], 0xff);
    }

    #[test]
    fn short_master_key_is_rejected() {
        let mut config = test_config();
        config.statement_master_key = "abcd".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMasterKey)
        ));
    }

    #[test]
    fn non_http_gateway_url_is_rejected() {
        let mut config = test_config();
        config.three_ds_api_url = "ftp://gateway.example".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { name: "THREE_DS_API_URL", .. })
        ));
    }

    #[test]
    fn threshold_must_be_positive() {
        let mut config = test_config();
        config.large_transfer_threshold_cents = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold)
        ));
    }
}

//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. The scheduler secret has no default: the job endpoints must
//! never run unguarded.

use std::env;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// SQLite database file path
    pub database_path: String,

    /// Shared secret for the scheduler-invoked job endpoints (required)
    pub scheduler_secret: String,

    /// SMTP relay host; email sending is disabled when unset
    pub smtp_host: Option<String>,

    /// SMTP relay port
    pub smtp_port: u16,

    /// SMTP credentials (optional; unauthenticated relay when unset)
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    /// Global fallback sender address for outbound email
    pub smtp_from_address: String,

    /// Global fallback sender display name
    pub smtp_from_name: String,

    /// SMS gateway URL; SMS sending is disabled when unset
    pub sms_gateway_url: Option<String>,

    /// SMS gateway API key
    pub sms_api_key: Option<String>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ApiConfig {
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HTTP_PORT".to_string()))?,

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "haven.db".to_string()),

            scheduler_secret: env::var("SCHEDULER_SECRET")
                .map_err(|_| ConfigError::MissingRequired("SCHEDULER_SECRET".to_string()))?,

            smtp_host: env::var("SMTP_HOST").ok(),

            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SMTP_PORT".to_string()))?,

            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),

            smtp_from_address: env::var("SMTP_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@haven-pms.example".to_string()),

            smtp_from_name: env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| "Haven PMS".to_string()),

            sms_gateway_url: env::var("SMS_GATEWAY_URL").ok(),

            sms_api_key: env::var("SMS_API_KEY").ok(),
        };

        if config.scheduler_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("SCHEDULER_SECRET".to_string()));
        }

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Environment-variable tests mutate process state, so everything is
    // exercised in a single test body.
    #[test]
    fn test_load_requires_scheduler_secret() {
        env::remove_var("SCHEDULER_SECRET");
        assert!(matches!(
            ApiConfig::load(),
            Err(ConfigError::MissingRequired(_))
        ));

        env::set_var("SCHEDULER_SECRET", "s3cret");
        env::remove_var("HTTP_PORT");
        let config = ApiConfig::load().expect("config with secret set");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.scheduler_secret, "s3cret");
        env::remove_var("SCHEDULER_SECRET");
    }
}

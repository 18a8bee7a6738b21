//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub youtube: YoutubeConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Allowed cross-origin host (e.g., "https://app.example.com").
    /// Empty means permissive CORS for local development.
    #[serde(default)]
    pub cors_origin: String,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Media host configuration (S3-compatible object storage)
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Bucket name for uploaded media
    pub bucket: String,
    /// Public URL base for uploaded media (CDN/custom domain)
    /// e.g., "https://media.example.com"
    pub public_url: String,
    /// S3-compatible endpoint, e.g. "https://<account>.r2.cloudflarestorage.com"
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Authentication configuration (JWT token pair)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Access token signing secret (32+ bytes)
    pub access_token_secret: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes)
    pub access_token_ttl_seconds: i64,
    /// Refresh token signing secret (32+ bytes)
    pub refresh_token_secret: String,
    /// Refresh token lifetime in seconds (default: 864000 = 10 days)
    pub refresh_token_ttl_seconds: i64,
}

/// YouTube Data API proxy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeConfig {
    /// Data API key. Absence fails provider calls only, never startup.
    pub api_key: Option<String>,
    /// Response cache TTL in seconds (default: 3600)
    pub cache_ttl_seconds: i64,
    /// Outbound request timeout in seconds (default: 10)
    pub request_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (VIDNEST_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.cors_origin", "")?
            .set_default("auth.access_token_ttl_seconds", 900)?
            .set_default("auth.refresh_token_ttl_seconds", 864_000)?
            .set_default("youtube.cache_ttl_seconds", 3600)?
            .set_default("youtube.request_timeout_seconds", 10)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("VIDNEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SECRET_BYTES: usize = 32;

        for (name, secret) in [
            ("auth.access_token_secret", &self.auth.access_token_secret),
            ("auth.refresh_token_secret", &self.auth.refresh_token_secret),
        ] {
            if secret.as_bytes().len() < MIN_SECRET_BYTES {
                return Err(crate::error::AppError::Config(format!(
                    "{} must be at least {} bytes",
                    name, MIN_SECRET_BYTES
                )));
            }
        }

        if self.auth.access_token_ttl_seconds <= 0 || self.auth.refresh_token_ttl_seconds <= 0 {
            return Err(crate::error::AppError::Config(
                "token lifetimes must be greater than 0".to_string(),
            ));
        }

        if self.auth.refresh_token_ttl_seconds <= self.auth.access_token_ttl_seconds {
            return Err(crate::error::AppError::Config(
                "auth.refresh_token_ttl_seconds must exceed auth.access_token_ttl_seconds"
                    .to_string(),
            ));
        }

        if self.youtube.cache_ttl_seconds <= 0 {
            return Err(crate::error::AppError::Config(
                "youtube.cache_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.youtube.api_key.is_none() {
            tracing::warn!("youtube.api_key is not set; provider proxy endpoints will fail");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origin: String::new(),
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/vidnest-test.db"),
            },
            storage: StorageConfig {
                bucket: "media".to_string(),
                public_url: "https://media.example.com".to_string(),
                endpoint: "https://account.r2.cloudflarestorage.com".to_string(),
                access_key_id: "access-key".to_string(),
                secret_access_key: "secret-key".to_string(),
            },
            auth: AuthConfig {
                access_token_secret: "a".repeat(32),
                access_token_ttl_seconds: 900,
                refresh_token_secret: "r".repeat(32),
                refresh_token_ttl_seconds: 864_000,
            },
            youtube: YoutubeConfig {
                api_key: Some("key".to_string()),
                cache_ttl_seconds: 3600,
                request_timeout_seconds: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_token_secret() {
        let mut config = valid_config();
        config.auth.access_token_secret = "short".to_string();

        let error = config
            .validate()
            .expect_err("secret shorter than 32 bytes must fail");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("auth.access_token_secret")
        ));
    }

    #[test]
    fn validate_rejects_refresh_ttl_not_exceeding_access_ttl() {
        let mut config = valid_config();
        config.auth.refresh_token_ttl_seconds = config.auth.access_token_ttl_seconds;

        let error = config
            .validate()
            .expect_err("refresh lifetime must exceed access lifetime");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("refresh_token_ttl_seconds")
        ));
    }

    #[test]
    fn validate_allows_missing_provider_key() {
        let mut config = valid_config();
        config.youtube.api_key = None;
        assert!(config.validate().is_ok());
    }
}

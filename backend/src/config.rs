//! Configuration management for the charcoal distribution backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with CDM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Signing key used when none is configured; refused in production
pub const DEFAULT_JWT_SECRET: &str = "development-secret-key";

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Object storage for receipts
    pub storage: StorageConfig,

    /// List endpoint limits
    pub pagination: PaginationConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Custom S3-compatible endpoint such as MinIO; empty for AWS itself
    pub endpoint: String,

    pub region: String,

    /// Bucket name; when empty receipts are kept in memory
    pub bucket: String,

    /// Static credentials; when empty the AWS default chain is used
    pub access_key_id: String,

    pub secret_access_key: String,

    /// Lifetime of presigned receipt URLs
    pub presign_ttl_seconds: u64,

    /// Largest accepted upload
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn is_configured(&self) -> bool {
        !self.bucket.is_empty()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    /// Upper bound applied to the `per_page` query parameter
    pub max_per_page: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("CDM__ENVIRONMENT")
            .or_else(|_| std::env::var("CDM_ENVIRONMENT"))
            .unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.secret", DEFAULT_JWT_SECRET)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("storage.endpoint", "")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.bucket", "")?
            .set_default("storage.access_key_id", "")?
            .set_default("storage.secret_access_key", "")?
            .set_default("storage.presign_ttl_seconds", 3600)?
            .set_default("storage.max_upload_bytes", 5 * 1024 * 1024)?
            .set_default("pagination.max_per_page", 100)?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (CDM__ prefix)
            .add_source(
                Environment::with_prefix("CDM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<Config>()?.checked()
    }

    /// Reject settings that must never reach production
    fn checked(self) -> Result<Self, ConfigError> {
        if self.is_production() && (self.jwt.secret.is_empty() || self.jwt.secret == DEFAULT_JWT_SECRET) {
            return Err(ConfigError::Message(
                "jwt.secret must be set (CDM__JWT__SECRET) in production".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Fully populated configuration for unit tests
#[cfg(test)]
pub(crate) fn test_config(environment: &str, secret: &str) -> Config {
    Config {
        environment: environment.to_string(),
        server: ServerConfig {
            port: 3000,
            host: "127.0.0.1".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/cdm".to_string(),
            max_connections: 5,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: secret.to_string(),
            access_token_expiry: 3600,
        },
        storage: StorageConfig {
            endpoint: String::new(),
            region: "us-east-1".to_string(),
            bucket: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            presign_ttl_seconds: 600,
            max_upload_bytes: 1024,
        },
        pagination: PaginationConfig { max_per_page: 100 },
        logging: LoggingConfig { json: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_refuses_default_secret() {
        assert!(test_config("production", DEFAULT_JWT_SECRET).checked().is_err());
        assert!(test_config("production", "").checked().is_err());
        assert!(test_config("production", "a-long-random-secret").checked().is_ok());
    }

    #[test]
    fn development_accepts_default_secret() {
        assert!(test_config("development", DEFAULT_JWT_SECRET).checked().is_ok());
    }
}

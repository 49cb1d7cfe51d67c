use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing settings.
///
/// The lifetimes are kept exactly as they were read and only parsed when a
/// login needs them, so a bad value fails that login with a configuration
/// error instead of silently falling back to a default.
#[derive(Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub access_token_expire_minutes: String,
    pub refresh_token_expire_days: String,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

const MAX_TOKEN_LIFETIME_DAYS: i64 = 36_500;

/// Parsed access/refresh lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenLifetimes {
    pub fn access_seconds(&self) -> i64 {
        self.access.num_seconds()
    }
}

impl JwtSettings {
    /// Symmetric signing algorithm. Only the HMAC family fits a shared secret.
    pub fn signing_algorithm(&self) -> Result<Algorithm, ConfigError> {
        let algorithm = Algorithm::from_str(self.algorithm.trim()).map_err(|_| {
            ConfigError::InvalidValue(format!("jwt.algorithm '{}' is not recognised", self.algorithm))
        })?;

        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
            other => Err(ConfigError::InvalidValue(format!(
                "jwt.algorithm {:?} needs a key pair, only HS256/HS384/HS512 are supported",
                other
            ))),
        }
    }

    pub fn token_lifetimes(&self) -> Result<TokenLifetimes, ConfigError> {
        let minutes = parse_positive("jwt.access_token_expire_minutes", &self.access_token_expire_minutes)?;
        let days = parse_positive("jwt.refresh_token_expire_days", &self.refresh_token_expire_days)?;
        if minutes > MAX_TOKEN_LIFETIME_DAYS * 24 * 60 || days > MAX_TOKEN_LIFETIME_DAYS {
            return Err(ConfigError::InvalidValue(format!(
                "token lifetimes may not exceed {} days",
                MAX_TOKEN_LIFETIME_DAYS
            )));
        }

        let access = Duration::try_minutes(minutes).ok_or_else(|| {
            ConfigError::InvalidValue("jwt.access_token_expire_minutes is out of range".to_string())
        })?;
        let refresh = Duration::try_days(days).ok_or_else(|| {
            ConfigError::InvalidValue("jwt.refresh_token_expire_days is out of range".to_string())
        })?;

        Ok(TokenLifetimes { access, refresh })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        self.signing_algorithm()?;
        Ok(())
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<i64, ConfigError> {
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

/// Loads settings from `configuration.yaml` (optional) and `APP_*`
/// environment variables, e.g. `APP_JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}

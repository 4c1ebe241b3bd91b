//! Service settings.
//!
//! Layered lowest to highest: built-in defaults, an optional
//! `config/<service>.toml`, then environment variables (`PORT`, `NATS_URL`,
//! `DATABASE_URL`, `JWT_SECRET`, `TOKEN_EXPIRATION`, `CALL_TIMEOUT_MS`,
//! `LOG_JSON`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Source(#[from] ConfigError),
    #[error("invalid duration: {0}")]
    Duration(String),
    #[error("JWT_SECRET must be set")]
    EmptySecret,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub nats_url: String,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub jwt_secret: String,
    pub token_expiration: String,
    pub call_timeout_ms: u64,
    pub log_json: bool,
}

impl Settings {
    /// Load settings for `service` from the process environment.
    pub fn load(service: &str) -> Result<Self, SettingsError> {
        Self::build(service, Environment::default().try_parsing(true))
    }

    /// Load settings with `vars` standing in for the process environment.
    pub fn from_env_map(service: &str, vars: HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::build(service, Environment::default().try_parsing(true).source(Some(vars)))
    }

    fn build(service: &str, environment: Environment) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .set_default("port", 8080)?
            .set_default("nats_url", "nats://127.0.0.1:4222")?
            .set_default("token_expiration", "24h")?
            .set_default("call_timeout_ms", 30_000)?
            .set_default("log_json", false)?
            .add_source(File::with_name(&format!("config/{service}")).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        if settings.jwt_secret.trim().is_empty() {
            return Err(SettingsError::EmptySecret);
        }
        settings.token_ttl()?;
        Ok(settings)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn token_ttl(&self) -> Result<Duration, SettingsError> {
        parse_duration(&self.token_expiration)
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Parse durations such as `90s`, `15m`, `24h` or `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, SettingsError> {
    let invalid = || SettingsError::Duration(input.to_string());
    let input = input.trim();
    if input.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" => amount.checked_mul(3600).map(Duration::from_secs),
            _ => return Err(invalid()),
        };
        total = unit
            .and_then(|unit| total.checked_add(unit))
            .ok_or_else(invalid)?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

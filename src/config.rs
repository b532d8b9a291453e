use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub lease_sweep_interval_secs: u64,
    pub lease_grace_secs: i64,
    pub default_claim_timeout_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            lease_sweep_interval_secs: parse_or_default("LEASE_SWEEP_INTERVAL_SECS", 30)?,
            lease_grace_secs: parse_or_default("LEASE_GRACE_SECS", 60)?,
            default_claim_timeout_minutes: parse_or_default("DEFAULT_CLAIM_TIMEOUT_MINUTES", 15)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

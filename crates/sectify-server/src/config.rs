use std::path::PathBuf;

use crate::error::ConfigError;

/// Process-wide configuration, sourced from environment variables.
/// Loaded once at startup; fails fast (exit code 2, mirroring the reaper
/// CLI) on a missing `MASTER_SECRET` or a malformed integer.
#[derive(Debug, Clone)]
pub struct Config {
    pub master_secret: Vec<u8>,
    pub hls_root: PathBuf,
    pub upload_root: PathBuf,
    pub db_url: Option<String>,
    pub token_ttl_access_min: i64,
    pub token_ttl_mfa_min: i64,
    pub reaper_interval_secs: u64,
    pub reaper_age_secs: u64,
    pub bind_addr: String,
}

const MIN_MASTER_SECRET_LEN: usize = 32;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let master_secret = std::env::var("MASTER_SECRET")
            .map_err(|_| ConfigError("MASTER_SECRET is required".into()))?
            .into_bytes();
        if master_secret.len() < MIN_MASTER_SECRET_LEN {
            return Err(ConfigError(format!(
                "MASTER_SECRET must be at least {MIN_MASTER_SECRET_LEN} bytes"
            )));
        }

        let hls_root = require_str("HLS_ROOT")?;
        let upload_root = require_str("UPLOAD_ROOT")?;
        let db_url = std::env::var("DB_URL").ok();

        Ok(Self {
            master_secret,
            hls_root: PathBuf::from(hls_root),
            upload_root: PathBuf::from(upload_root),
            db_url,
            token_ttl_access_min: parse_or("TOKEN_TTL_ACCESS_MIN", 30)?,
            token_ttl_mfa_min: parse_or("TOKEN_TTL_MFA_MIN", 5)?,
            reaper_interval_secs: parse_or("REAPER_INTERVAL_S", 120)?,
            reaper_age_secs: parse_or("REAPER_AGE_S", 600)?,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
        })
    }
}

fn require_str(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError(format!("{key} is required")))?;
    if value.trim().is_empty() {
        return Err(ConfigError(format!("{key} must not be empty")));
    }
    Ok(value)
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError(format!("{key} is not a valid integer: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReaperError, Result};

pub const DEFAULT_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_AGE_SECS: u64 = 600;

/// Reaper runtime configuration, sourced from `HLS_ROOT`,
/// `REAPER_INTERVAL_S` and `REAPER_AGE_S`.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    pub hls_root: PathBuf,
    pub interval: Duration,
    pub age: Duration,
}

impl ReaperConfig {
    pub fn from_env() -> Result<Self> {
        let hls_root = std::env::var("HLS_ROOT")
            .map_err(|_| ReaperError::InvalidConfig("HLS_ROOT is required".into()))?;
        if hls_root.trim().is_empty() {
            return Err(ReaperError::InvalidConfig("HLS_ROOT must not be empty".into()));
        }

        let interval = parse_secs_env("REAPER_INTERVAL_S", DEFAULT_INTERVAL_SECS)?;
        let age = parse_secs_env("REAPER_AGE_S", DEFAULT_AGE_SECS)?;

        Ok(Self {
            hls_root: PathBuf::from(hls_root),
            interval: Duration::from_secs(interval),
            age: Duration::from_secs(age),
        })
    }
}

fn parse_secs_env(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| ReaperError::InvalidConfig(format!("{key} must be a non-negative integer, got {raw:?}"))),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(std::env::VarError::NotUnicode(_)) => {
            Err(ReaperError::InvalidConfig(format!("{key} is not valid UTF-8")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear() {
        std::env::remove_var("HLS_ROOT");
        std::env::remove_var("REAPER_INTERVAL_S");
        std::env::remove_var("REAPER_AGE_S");
    }

    #[test]
    fn missing_hls_root_is_invalid() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        let err = ReaperConfig::from_env().unwrap_err();
        assert!(matches!(err, ReaperError::InvalidConfig(_)));
    }

    #[test]
    fn defaults_apply_when_intervals_are_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("HLS_ROOT", "/tmp/hls");
        let cfg = ReaperConfig::from_env().unwrap();
        assert_eq!(cfg.interval, Duration::from_secs(DEFAULT_INTERVAL_SECS));
        assert_eq!(cfg.age, Duration::from_secs(DEFAULT_AGE_SECS));
        clear();
    }

    #[test]
    fn malformed_interval_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear();
        std::env::set_var("HLS_ROOT", "/tmp/hls");
        std::env::set_var("REAPER_INTERVAL_S", "not-a-number");
        let err = ReaperConfig::from_env().unwrap_err();
        assert!(matches!(err, ReaperError::InvalidConfig(_)));
        clear();
    }
}

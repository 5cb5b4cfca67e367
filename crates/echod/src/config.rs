//! Runtime configuration from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Rendezvous path used when `ECHOLOOP_PATH` is unset.
pub const DEFAULT_PATH: &str = "/tmp/echoloop.fifo";

/// Flush period used when `ECHOLOOP_FLUSH_MS` is unset.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub const PATH_VAR: &str = "ECHOLOOP_PATH";
pub const FLUSH_VAR: &str = "ECHOLOOP_FLUSH_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// FIFO path; also keys the counter set.
    pub path: PathBuf,
    /// How often the collector re-emits its log.
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(PATH_VAR).filter(|p| !p.is_empty()) {
            config.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(FLUSH_VAR) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::InvalidFlushInterval(raw.clone()))?;
            config.flush_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid ECHOLOOP_FLUSH_MS: {0:?} (expected a positive number of milliseconds)")]
    InvalidFlushInterval(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/echoloop.fifo"));
        assert_eq!(config.flush_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ECHOLOOP_PATH", "/run/echo.fifo"),
            ("ECHOLOOP_FLUSH_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.path, PathBuf::from("/run/echo.fifo"));
        assert_eq!(config.flush_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_empty_path_keeps_default() {
        let config = Config::from_lookup(lookup(&[("ECHOLOOP_PATH", "")])).unwrap();
        assert_eq!(config.path, PathBuf::from(DEFAULT_PATH));
    }

    #[test]
    fn test_invalid_interval_rejected() {
        for bad in ["0", "-5", "soon", ""] {
            let err = Config::from_lookup(lookup(&[("ECHOLOOP_FLUSH_MS", bad)])).unwrap_err();
            assert_eq!(err, ConfigError::InvalidFlushInterval(bad.to_string()));
            assert!(err.to_string().contains("ECHOLOOP_FLUSH_MS"));
        }
    }
}

//! Config loading (spec §10.4). Grounded on `tooling::config::{builder,env}`:
//! a `ConfigBuilder` trait standardizing `validate`/`from_env`/`merge`
//! across subsystems, plus small env-parsing helpers.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// Common shape for a subsystem's tunables: build from defaults, load
/// from the environment, merge the two, and validate the result.
pub trait ConfigBuilder: Default + Clone {
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn from_env(prefix: &str) -> Result<Self>;

    fn merge(&mut self, other: Self) -> &mut Self;

    fn build() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    fn from_env_with_defaults(prefix: &str) -> Result<Self> {
        let mut config = Self::from_env(prefix)?;
        config.merge(Self::default());
        config.validate()?;
        Ok(config)
    }
}

pub fn get_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

pub fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key) {
        Some(val) => val
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseEnv { key: key.to_string(), reason: e.to_string() }),
        None => Ok(None),
    }
}

pub fn get_env_bool(key: &str) -> Result<Option<bool>> {
    match get_env(key) {
        Some(val) => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::ParseEnv { key: key.to_string(), reason: format!("not a boolean: {val}") }),
        },
        None => Ok(None),
    }
}

/// Scheduler tunables (spec §4.8, §6 "Configuration env vars").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub max_concurrency: usize,
    pub starvation_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { enabled: false, max_concurrency: 8, starvation_timeout: Duration::from_secs(30) }
    }
}

impl ConfigBuilder for SchedulerConfig {
    fn validate(&self) -> Result<()> {
        if self.enabled && self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrency".to_string(),
                reason: "must be at least 1 when the scheduler is enabled".to_string(),
            });
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> Result<Self> {
        let mut config = SchedulerConfig::default();
        if let Some(enabled) = get_env_bool(&format!("{prefix}SCHEDULER_ENABLED"))? {
            config.enabled = enabled;
        }
        if let Some(max) = get_env_parse::<usize>(&format!("{prefix}SCHEDULER_MAX_CONCURRENCY"))? {
            config.max_concurrency = max;
        }
        if let Some(ms) = get_env_parse::<u64>(&format!("{prefix}SCHEDULER_STARVATION_TIMEOUT_MS"))? {
            config.starvation_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        *self = other.clone();
        self
    }
}

/// Cache tunables (spec §4.7, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_size: Option<usize>,
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { max_size: None, default_ttl: Duration::from_secs(300) }
    }
}

impl ConfigBuilder for CacheConfig {
    fn from_env(prefix: &str) -> Result<Self> {
        let mut config = CacheConfig::default();
        if let Some(max_size) = get_env_parse::<usize>(&format!("{prefix}CACHE_MAX_SIZE"))? {
            config.max_size = Some(max_size);
        }
        if let Some(ms) = get_env_parse::<u64>(&format!("{prefix}CACHE_DEFAULT_TTL_MS"))? {
            config.default_ttl = Duration::from_millis(ms);
        }
        Ok(config)
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        *self = other.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults_are_disabled() {
        let config = SchedulerConfig::default();
        assert!(!config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn scheduler_config_rejects_zero_concurrency_when_enabled() {
        let config = SchedulerConfig { enabled: true, max_concurrency: 0, ..SchedulerConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn scheduler_config_reads_env_vars() {
        env::set_var("CONSTELLATION_TEST1_SCHEDULER_ENABLED", "true");
        env::set_var("CONSTELLATION_TEST1_SCHEDULER_MAX_CONCURRENCY", "16");
        let config = SchedulerConfig::from_env("CONSTELLATION_TEST1_").unwrap();
        assert!(config.enabled);
        assert_eq!(config.max_concurrency, 16);
        env::remove_var("CONSTELLATION_TEST1_SCHEDULER_ENABLED");
        env::remove_var("CONSTELLATION_TEST1_SCHEDULER_MAX_CONCURRENCY");
    }

    #[test]
    fn cache_config_reads_env_vars() {
        env::set_var("CONSTELLATION_TEST2_CACHE_MAX_SIZE", "1024");
        let config = CacheConfig::from_env("CONSTELLATION_TEST2_").unwrap();
        assert_eq!(config.max_size, Some(1024));
        env::remove_var("CONSTELLATION_TEST2_CACHE_MAX_SIZE");
    }

    #[test]
    fn build_returns_validated_defaults() {
        let config = SchedulerConfig::build().unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }
}

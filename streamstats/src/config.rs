//! Runtime configuration.
//!
//! A single [`StatsConfig`] is built once in each binary and handed to every
//! component that needs it.  Values come from built-in defaults overridden by
//! `STREAMSTATS_*` environment variables (a local `.env` file is honoured).
//!
//! | Env var                            | Default                    |
//! |------------------------------------|----------------------------|
//! | `STREAMSTATS_BASE_URL`             | `https://api.pulstream.so` |
//! | `STREAMSTATS_DEFAULT_PAGE_SIZE`    | `20`                       |
//! | `STREAMSTATS_BATCH_SIZE`           | `50`                       |
//! | `STREAMSTATS_SAFETY_CEILING`       | `1000`                     |
//! | `STREAMSTATS_POLL_INTERVAL_SECS`   | `15`                       |
//! | `STREAMSTATS_PAGE_STALE_SECS`      | `10`                       |
//! | `STREAMSTATS_AGGREGATE_STALE_SECS` | `300`                      |
//! | `STREAMSTATS_REQUEST_TIMEOUT_SECS` | `10`                       |

use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{MAX_LIMIT, MIN_LIMIT};

pub const DEFAULT_BASE_URL: &str = "https://api.pulstream.so";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatsConfig {
    /// Base URL of the upstream stats API (no trailing path).
    pub base_url: String,
    /// Page size used when a query does not specify `limit`.
    pub default_page_size: u32,
    /// Page size used by the aggregate sweep.
    pub batch_size: u32,
    /// The sweep stops once its offset passes this value.
    pub safety_ceiling: u32,
    pub poll_interval_secs: u64,
    /// How long a fetched page may be reused for an identical query.
    pub page_stale_secs: u64,
    /// How long a completed aggregate sweep may be reused.
    pub aggregate_stale_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_page_size: 20,
            batch_size: 50,
            safety_ceiling: 1000,
            poll_interval_secs: 15,
            page_stale_secs: 10,
            aggregate_stale_secs: 300,
            request_timeout_secs: 10,
        }
    }
}

impl StatsConfig {
    /// Load from `.env` + process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(Environment::with_prefix("STREAMSTATS"))
    }

    /// Load from an explicit environment source.  Tests pass a map through
    /// [`Environment::source`] instead of mutating the process environment.
    pub fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let d = Self::default();
        let cfg: StatsConfig = Config::builder()
            .set_default("base_url", d.base_url)?
            .set_default("default_page_size", i64::from(d.default_page_size))?
            .set_default("batch_size", i64::from(d.batch_size))?
            .set_default("safety_ceiling", i64::from(d.safety_ceiling))?
            .set_default("poll_interval_secs", d.poll_interval_secs as i64)?
            .set_default("page_stale_secs", d.page_stale_secs as i64)?
            .set_default("aggregate_stale_secs", d.aggregate_stale_secs as i64)?
            .set_default("request_timeout_secs", d.request_timeout_secs as i64)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".into()));
        }
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&self.default_page_size) {
            return Err(ConfigError::Invalid(format!(
                "default_page_size must be between {MIN_LIMIT} and {MAX_LIMIT}"
            )));
        }
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&self.batch_size) {
            return Err(ConfigError::Invalid(format!(
                "batch_size must be between {MIN_LIMIT} and {MAX_LIMIT}"
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn page_stale_after(&self) -> Duration {
        Duration::from_secs(self.page_stale_secs)
    }

    pub fn aggregate_stale_after(&self) -> Duration {
        Duration::from_secs(self.aggregate_stale_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("STREAMSTATS").source(Some(map))
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = StatsConfig::from_environment(env(&[])).unwrap();
        assert_eq!(cfg, StatsConfig::default());
        assert_eq!(cfg.poll_interval(), Duration::from_secs(15));
        assert_eq!(cfg.aggregate_stale_after(), Duration::from_secs(300));
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = StatsConfig::from_environment(env(&[
            ("STREAMSTATS_BASE_URL", "http://localhost:9000"),
            ("STREAMSTATS_BATCH_SIZE", "25"),
            ("STREAMSTATS_POLL_INTERVAL_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.batch_size, 25);
        assert_eq!(cfg.poll_interval_secs, 5);
        assert_eq!(cfg.safety_ceiling, 1000);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = StatsConfig::from_environment(env(&[("STREAMSTATS_POLL_INTERVAL_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_oversized_page_size() {
        let cfg = StatsConfig {
            default_page_size: 1001,
            ..StatsConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}

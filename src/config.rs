//! Environment configuration.
//!
//! Settings can be built in code, read from `FERROUS_INJECT_*` environment
//! variables, or (with the `config` feature) loaded from JSON.

use std::env;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::DEFAULT_SWEEP_INTERVAL;
use crate::policy::PolicySet;

/// Environment variable holding the sweep interval in milliseconds.
pub const ENV_SWEEP_INTERVAL_MS: &str = "FERROUS_INJECT_SWEEP_INTERVAL_MS";
/// Environment variable enabling the thread provider.
pub const ENV_THREAD_SCOPES: &str = "FERROUS_INJECT_THREAD_SCOPES";
/// Environment variable enabling the task provider.
pub const ENV_TASK_SCOPES: &str = "FERROUS_INJECT_TASK_SCOPES";

/// Settings used to build an [`Environment`](crate::Environment).
///
/// # Examples
///
/// ```
/// use ferrous_inject::{CachingPolicy, Environment, EnvironmentConfig, PolicySet};
/// use std::time::Duration;
///
/// let config = EnvironmentConfig::default()
///     .sweep_interval(Duration::from_millis(250))
///     .thread_scopes(false)
///     .policies(PolicySet::only(&[CachingPolicy::Singleton, CachingPolicy::ScopeCached]));
///
/// let env = Environment::from_config(config);
/// assert!(env.thread_scopes().is_none());
/// assert!(env.task_scopes().is_some());
/// assert_eq!(env.cache().sweep_interval(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct EnvironmentConfig {
    /// Minimum time between automatic sweeps
    #[cfg_attr(feature = "config", serde(rename = "sweep_interval_ms", with = "duration_ms"))]
    pub sweep_interval: Duration,
    /// Register the thread provider
    pub thread_scopes: bool,
    /// Register the task provider
    pub task_scopes: bool,
    /// Policies the scope cache serves
    pub policies: PolicySet,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            thread_scopes: true,
            task_scopes: true,
            policies: PolicySet::all(),
        }
    }
}

impl EnvironmentConfig {
    /// Minimum time between automatic sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enables or disables the built-in thread provider.
    pub fn thread_scopes(mut self, enabled: bool) -> Self {
        self.thread_scopes = enabled;
        self
    }

    /// Enables or disables the built-in task provider.
    pub fn task_scopes(mut self, enabled: bool) -> Self {
        self.task_scopes = enabled;
        self
    }

    /// Restricts the caching policies the cache serves.
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    /// Defaults overridden by the `FERROUS_INJECT_*` environment variables.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = read_var(ENV_SWEEP_INTERVAL_MS, |v| v.parse::<u64>().ok()) {
            config.sweep_interval = Duration::from_millis(ms);
        }
        if let Some(enabled) = read_var(ENV_THREAD_SCOPES, parse_flag) {
            config.thread_scopes = enabled;
        }
        if let Some(enabled) = read_var(ENV_TASK_SCOPES, parse_flag) {
            config.task_scopes = enabled;
        }

        config
    }

    /// Reads the configuration from JSON. Missing fields keep their defaults.
    ///
    /// ```
    /// use ferrous_inject::EnvironmentConfig;
    /// use std::time::Duration;
    ///
    /// let config = EnvironmentConfig::from_json(r#"{ "sweep_interval_ms": 100, "task_scopes": false }"#).unwrap();
    /// assert_eq!(config.sweep_interval, Duration::from_millis(100));
    /// assert!(config.thread_scopes);
    /// assert!(!config.task_scopes);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn read_var<T>(name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let raw = env::var(name).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(variable = name, value = %raw, "ignoring unparsable configuration value");
    }
    parsed
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(feature = "config")]
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

//! Sync timing and remote endpoint configuration.
//!
//! Defaults suit an interactive client: pushes batch after a short quiet
//! period, pulls run every half minute and never while local changes are
//! still queued. Every value can be overridden through `TASKDECK_*`
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Timers, timeouts and retry budget of the reconciliation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Period of the background pull
    pub poll_interval: Duration,
    /// Quiet period after the last local change before pushing
    pub debounce: Duration,
    /// Minimum gap between two non-initial pulls
    pub min_pull_spacing: Duration,
    /// Upper bound for the blocking first load
    pub initial_load_timeout: Duration,
    /// Upper bound for a background pull
    pub pull_timeout: Duration,
    /// Upper bound for one pushed change
    pub push_timeout: Duration,
    /// Failed attempts after which a pending change is dropped
    pub max_retries: u32,
    /// How many dropped changes are remembered
    pub dropped_log_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            debounce: Duration::from_secs(2),
            min_pull_spacing: Duration::from_secs(5),
            initial_load_timeout: Duration::from_secs(15),
            pull_timeout: Duration::from_secs(45),
            push_timeout: Duration::from_secs(15),
            max_retries: 3,
            dropped_log_capacity: 50,
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Build settings from a variable lookup, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let poll_interval = duration_secs(
            &lookup,
            "TASKDECK_POLL_INTERVAL_SECS",
            defaults.poll_interval,
        )?;
        if poll_interval < Duration::from_secs(1) {
            return Err(Error::Config("TASKDECK_POLL_INTERVAL_SECS must be >= 1".to_string()));
        }

        let debounce = match parse_number::<u64>(&lookup, "TASKDECK_DEBOUNCE_MS")? {
            Some(millis) => Duration::from_millis(millis),
            None => defaults.debounce,
        };

        let min_pull_spacing = duration_secs(
            &lookup,
            "TASKDECK_MIN_PULL_SPACING_SECS",
            defaults.min_pull_spacing,
        )?;
        let initial_load_timeout = duration_secs(
            &lookup,
            "TASKDECK_INITIAL_LOAD_TIMEOUT_SECS",
            defaults.initial_load_timeout,
        )?;
        let pull_timeout =
            duration_secs(&lookup, "TASKDECK_PULL_TIMEOUT_SECS", defaults.pull_timeout)?;
        let push_timeout =
            duration_secs(&lookup, "TASKDECK_PUSH_TIMEOUT_SECS", defaults.push_timeout)?;
        for (name, value) in [
            ("TASKDECK_INITIAL_LOAD_TIMEOUT_SECS", initial_load_timeout),
            ("TASKDECK_PULL_TIMEOUT_SECS", pull_timeout),
            ("TASKDECK_PUSH_TIMEOUT_SECS", push_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be >= 1")));
            }
        }

        let max_retries =
            parse_number::<u32>(&lookup, "TASKDECK_MAX_RETRIES")?.unwrap_or(defaults.max_retries);
        if max_retries == 0 {
            return Err(Error::Config("TASKDECK_MAX_RETRIES must be >= 1".to_string()));
        }

        let dropped_log_capacity =
            parse_number::<usize>(&lookup, "TASKDECK_DROPPED_LOG_CAPACITY")?
                .unwrap_or(defaults.dropped_log_capacity);

        Ok(Self {
            poll_interval,
            debounce,
            min_pull_spacing,
            initial_load_timeout,
            pull_timeout,
            push_timeout,
            max_retries,
            dropped_log_capacity,
        })
    }
}

/// Where the remote persistence service lives and how to authenticate
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL without trailing slash, e.g. `https://tasks.example.com`
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| Error::Config("API URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::Config(
                "API URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: normalize_text_option(token),
        })
    }
}

fn duration_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    Ok(parse_number::<u64>(lookup, name)?.map_or(default, Duration::from_secs))
}

fn parse_number<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{name} must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<SyncSettings> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        SyncSettings::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(settings_from(&[]).unwrap(), SyncSettings::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = settings_from(&[
            ("TASKDECK_POLL_INTERVAL_SECS", "60"),
            ("TASKDECK_DEBOUNCE_MS", "500"),
            ("TASKDECK_MAX_RETRIES", " 5 "),
        ])
        .unwrap();

        assert_eq!(settings.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.debounce, Duration::from_millis(500));
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.pull_timeout, SyncSettings::default().pull_timeout);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = settings_from(&[("TASKDECK_MAX_RETRIES", "0")]).unwrap_err();
        assert!(error.to_string().contains("TASKDECK_MAX_RETRIES"));

        let error = settings_from(&[("TASKDECK_POLL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(error.to_string().contains("TASKDECK_POLL_INTERVAL_SECS"));

        assert!(settings_from(&[("TASKDECK_PUSH_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn remote_config_normalizes_and_validates_url() {
        let config = RemoteConfig::new(" https://tasks.example.com/ ", Some(" ".to_string()))
            .unwrap();
        assert_eq!(config.base_url, "https://tasks.example.com");
        assert_eq!(config.token, None);

        assert!(RemoteConfig::new("tasks.example.com", None).is_err());
        assert!(RemoteConfig::new("  ", None).is_err());
    }

    #[test]
    fn remote_config_debug_redacts_token() {
        let config =
            RemoteConfig::new("https://tasks.example.com", Some("secret-token".to_string()))
                .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}

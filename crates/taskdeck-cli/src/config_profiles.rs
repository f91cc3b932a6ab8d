//! Persistent CLI profile configuration.
//!
//! Connection settings resolve per field in the order: command-line flag,
//! `TASKDECK_*` environment variable, stored profile.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taskdeck_core::util::{is_http_url, normalize_text_option};
use taskdeck_core::RemoteConfig;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const SNAPSHOT_FILE_NAME: &str = "session.json";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for CliProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliProfile")
            .field("api_url", &self.api_url)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

const fn default_config_version() -> u32 {
    1
}

fn config_dir() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("taskdeck"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Snapshot location for a profile, under the platform data directory.
pub fn default_snapshot_path(profile: &str) -> Result<PathBuf, CliError> {
    dirs::data_local_dir()
        .map(|dir| {
            dir.join("taskdeck")
                .join(profile)
                .join(SNAPSHOT_FILE_NAME)
        })
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!(
                "Failed to read config at {}: {}",
                path.display(),
                error
            ))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            CliError::Config(format!(
                "Failed to parse config at {}: {}",
                path.display(),
                error
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn resolve_profile_name(
        &self,
        explicit: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(lookup("TASKDECK_PROFILE").as_deref()) {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        DEFAULT_PROFILE.to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    fn normalize(&mut self) {
        self.api_url =
            normalize_text_option(self.api_url.take()).map(|url| url.trim_end_matches('/').into());
        self.user = normalize_text_option(self.user.take());
        self.token = normalize_text_option(self.token.take());
    }
}

/// Command-line overrides for the connection settings
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub profile: Option<String>,
    pub api_url: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
    pub state: Option<PathBuf>,
}

/// Everything a command needs to open a session
#[derive(Debug, Clone)]
pub struct Connection {
    pub profile: String,
    pub remote: RemoteConfig,
    pub user: String,
    pub snapshot_path: PathBuf,
}

impl Connection {
    pub fn resolve(
        config: &CliProfilesConfig,
        overrides: ConnectionOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let profile_name = config.resolve_profile_name(overrides.profile.as_deref(), &lookup);
        let stored = config.profile(&profile_name).cloned().unwrap_or_default();

        let api_url = normalize_text_option(overrides.api_url)
            .or_else(|| normalize_text_option(lookup("TASKDECK_API_URL")))
            .or(stored.api_url)
            .ok_or(CliError::NotConfigured)?;
        if !is_http_url(&api_url) {
            return Err(CliError::Config(format!(
                "API URL must start with http:// or https://, got '{api_url}'"
            )));
        }
        let user = normalize_text_option(overrides.user)
            .or_else(|| normalize_text_option(lookup("TASKDECK_USER")))
            .or(stored.user)
            .ok_or(CliError::NotConfigured)?;
        let token = normalize_text_option(overrides.token)
            .or_else(|| normalize_text_option(lookup("TASKDECK_TOKEN")))
            .or(stored.token);

        let snapshot_path = match overrides.state {
            Some(path) => path,
            None => default_snapshot_path(&profile_name)?,
        };

        Ok(Self {
            profile: profile_name,
            remote: RemoteConfig::new(api_url, token)?,
            user,
            snapshot_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn config_with(profile: &str, stored: CliProfile) -> CliProfilesConfig {
        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(profile.to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(profile.to_string(), stored);
        config
    }

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
    }

    #[test]
    fn config_roundtrip_normalizes_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let config = config_with(
            "default",
            CliProfile {
                api_url: Some(" https://tasks.example.com/ ".to_string()),
                user: Some(" user-1 ".to_string()),
                token: Some("   ".to_string()),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.api_url.as_deref(), Some("https://tasks.example.com"));
        assert_eq!(profile.user.as_deref(), Some("user-1"));
        assert_eq!(profile.token, None);
    }

    #[test]
    fn missing_config_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_env_then_active() {
        let config = config_with("work", CliProfile::default());
        let env = |key: &str| (key == "TASKDECK_PROFILE").then(|| "phone".to_string());
        assert_eq!(config.resolve_profile_name(Some("laptop"), env), "laptop");
        assert_eq!(config.resolve_profile_name(None, env), "phone");
        assert_eq!(config.resolve_profile_name(None, no_env), "work");
        assert_eq!(
            CliProfilesConfig::default().resolve_profile_name(None, no_env),
            "default"
        );
    }

    #[test]
    fn connection_prefers_flags_then_env_then_profile() {
        let config = config_with(
            "default",
            CliProfile {
                api_url: Some("https://stored.example.com".to_string()),
                user: Some("stored-user".to_string()),
                token: Some("stored-token".to_string()),
            },
        );
        let env = |key: &str| match key {
            "TASKDECK_USER" => Some("env-user".to_string()),
            _ => None,
        };

        let connection = Connection::resolve(
            &config,
            ConnectionOverrides {
                api_url: Some("https://flag.example.com".to_string()),
                state: Some(PathBuf::from("/tmp/taskdeck.json")),
                ..ConnectionOverrides::default()
            },
            env,
        )
        .unwrap();

        assert_eq!(connection.remote.base_url, "https://flag.example.com");
        assert_eq!(connection.user, "env-user");
        assert_eq!(connection.remote.token.as_deref(), Some("stored-token"));
        assert_eq!(connection.snapshot_path, PathBuf::from("/tmp/taskdeck.json"));
    }

    #[test]
    fn connection_requires_url_and_user() {
        let error = Connection::resolve(
            &CliProfilesConfig::default(),
            ConnectionOverrides::default(),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(error, CliError::NotConfigured));
    }

    #[test]
    fn connection_rejects_non_http_url() {
        let error = Connection::resolve(
            &CliProfilesConfig::default(),
            ConnectionOverrides {
                api_url: Some("tasks.example.com".to_string()),
                user: Some("user-1".to_string()),
                ..ConnectionOverrides::default()
            },
            no_env,
        )
        .unwrap_err();
        assert!(matches!(error, CliError::Config(_)));
    }

    #[test]
    fn profile_debug_redacts_token() {
        let profile = CliProfile {
            token: Some("secret".to_string()),
            ..CliProfile::default()
        };
        let rendered = format!("{profile:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}

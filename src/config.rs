//! Application-level configuration loading, including cache TTLs and the
//! optional master PIN.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ROSTERSYNC_CONFIG_PATH";

/// TTL for the cached teams listing.
const DEFAULT_TEAMS_CACHE_TTL_SECS: u64 = 300;
/// TTL for cached fixture data pulled from the competition API.
const DEFAULT_FIXTURE_CACHE_TTL_SECS: u64 = 21_600;
/// TTL for the cached competition ladder.
const DEFAULT_LADDER_CACHE_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// TTL for the cached `getTeams` response.
    pub teams_cache_ttl: Duration,
    /// TTL for cached fixture responses.
    pub fixture_cache_ttl: Duration,
    /// TTL for cached ladder responses.
    pub ladder_cache_ttl: Duration,
    /// PIN accepted for any team in addition to its own. Disabled when unset.
    pub master_pin: Option<String>,
    /// Endpoint of the external text-generation service backing the insight
    /// actions. When unset, insights are served by a canned generator.
    pub insights_url: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            teams_cache_ttl: Duration::from_secs(DEFAULT_TEAMS_CACHE_TTL_SECS),
            fixture_cache_ttl: Duration::from_secs(DEFAULT_FIXTURE_CACHE_TTL_SECS),
            ladder_cache_ttl: Duration::from_secs(DEFAULT_LADDER_CACHE_TTL_SECS),
            master_pin: None,
            insights_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    teams_cache_ttl_secs: Option<u64>,
    #[serde(default)]
    fixture_cache_ttl_secs: Option<u64>,
    #[serde(default)]
    ladder_cache_ttl_secs: Option<u64>,
    #[serde(default)]
    master_pin: Option<String>,
    #[serde(default)]
    insights_url: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            teams_cache_ttl: raw
                .teams_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.teams_cache_ttl),
            fixture_cache_ttl: raw
                .fixture_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.fixture_cache_ttl),
            ladder_cache_ttl: raw
                .ladder_cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.ladder_cache_ttl),
            master_pin: raw.master_pin.filter(|pin| !pin.is_empty()),
            insights_url: raw.insights_url.filter(|url| !url.is_empty()),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_overrides_only_present_fields() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"teams_cache_ttl_secs": 60, "master_pin": "9999"}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.teams_cache_ttl, Duration::from_secs(60));
        assert_eq!(
            config.fixture_cache_ttl,
            Duration::from_secs(DEFAULT_FIXTURE_CACHE_TTL_SECS)
        );
        assert_eq!(config.master_pin.as_deref(), Some("9999"));
    }

    #[test]
    fn empty_master_pin_is_disabled() {
        let raw: RawConfig = serde_json::from_str(r#"{"master_pin": ""}"#).unwrap();
        let config = AppConfig::from(raw);
        assert!(config.master_pin.is_none());
    }
}

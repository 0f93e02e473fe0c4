//! Configuration profiles for patchbay clients.
//!
//! TOML profiles merged with `PATCHBAY_`-prefixed environment variables,
//! and translation to `patchbay_core::HubConfig`. Consumers (CLIs, UIs)
//! depend on this crate; core itself never reads config files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use patchbay_api::stream::ReconnectConfig;
use patchbay_api::transport::TlsMode;
use patchbay_core::HubConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve a profile by explicit name, falling back to the default.
    pub fn profile(&self, name: Option<&str>) -> Result<&Profile, ConfigError> {
        let wanted = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(wanted)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: wanted.to_owned(),
            })
    }
}

/// A named hub profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Hub base URL (e.g., "http://127.0.0.1:7010").
    pub hub: String,

    /// Path to a custom CA certificate for HTTPS hubs.
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS verification (self-signed hubs).
    pub insecure: Option<bool>,

    /// REST request timeout in seconds.
    pub timeout: Option<u64>,

    /// Settle delay for the connectivity indicator, in milliseconds.
    pub settle_ms: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "patchbay", "patchbay").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("patchbay");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit file path + environment.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PATCHBAY_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML at an explicit path.
pub fn save_config_to(cfg: &Config, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `HubConfig` from a profile.
pub fn profile_to_hub_config(profile: &Profile) -> Result<HubConfig, ConfigError> {
    let url: url::Url = profile.hub.parse().map_err(|_| ConfigError::Validation {
        field: "hub".into(),
        reason: format!("invalid URL: {}", profile.hub),
    })?;

    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    let defaults = HubConfig::default();

    Ok(HubConfig {
        url,
        tls,
        timeout: profile
            .timeout
            .map_or(defaults.timeout, Duration::from_secs),
        settle_delay: profile
            .settle_ms
            .map_or(defaults.settle_delay, Duration::from_millis),
        reconnect: ReconnectConfig::default(),
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shack_profile() -> Profile {
        Profile {
            hub: "http://10.0.0.3:7010".into(),
            ca_cert: None,
            insecure: None,
            timeout: Some(5),
            settle_ms: Some(2000),
        }
    }

    #[test]
    fn profile_translates_to_hub_config() {
        let config = profile_to_hub_config(&shack_profile()).unwrap();

        assert_eq!(config.url.as_str(), "http://10.0.0.3:7010/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.settle_delay, Duration::from_millis(2000));
        assert!(matches!(config.tls, TlsMode::System));
    }

    #[test]
    fn insecure_profile_disables_verification() {
        let mut profile = shack_profile();
        profile.insecure = Some(true);

        let config = profile_to_hub_config(&profile).unwrap();
        assert!(matches!(config.tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn invalid_hub_url_is_a_validation_error() {
        let mut profile = shack_profile();
        profile.hub = "not a url".into();

        let err = profile_to_hub_config(&profile).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn unknown_profile_lookup_fails() {
        let config = Config::default();
        let err = config.profile(Some("shack")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { .. }));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("shack".into(), shack_profile());
        config.default_profile = Some("shack".into());

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        assert_eq!(loaded.default_profile.as_deref(), Some("shack"));
        let profile = loaded.profile(None).unwrap();
        assert_eq!(profile.hub, "http://10.0.0.3:7010");
        assert_eq!(profile.timeout, Some(5));
    }
}

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub mod defaults;
pub mod duration_serde;
pub mod policy;

use defaults::*;
pub use policy::{ResolutionPolicy, TimeoutSettings};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub resolution: ResolutionPolicy,
}

/// Where the upstream bridge lives and how we talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    /// Overrides the `<crate>/<version>` user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BRIDGE_BASE_URL.to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
            user_agent: None,
        }
    }
}

impl BridgeConfig {
    /// Base URL without trailing slashes
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }

    pub fn validate(&self) -> AppResult<()> {
        let base = self.normalized_base_url();
        if base.is_empty() {
            return Err(AppError::configuration("bridge.base_url must not be empty"));
        }
        let parsed = url::Url::parse(&base)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::configuration(format!(
                "bridge.base_url must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load from `YTBRIDGE_CONFIG` (or the default file name) plus environment overrides
    pub fn load() -> AppResult<Self> {
        let config_file = std::env::var(format!("{DEFAULT_ENV_PREFIX}CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from_file(&config_file)
    }

    /// Defaults, then the TOML file if present, then `YTBRIDGE_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `YTBRIDGE_RESOLUTION__PROGRESSIVE_ONLY=false`.
    pub fn load_from_file(config_file: &str) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if Path::new(config_file).exists() {
            info!("Loading configuration from {}", config_file);
            figment = figment.merge(Toml::file(config_file));
        } else {
            debug!("Config file {} not found, using defaults and environment", config_file);
        }
        Self::from_figment(figment.merge(Env::prefixed(DEFAULT_ENV_PREFIX).split("__")))
    }

    /// Parse a TOML document on top of the defaults, without consulting the environment
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(contents)),
        )
    }

    fn from_figment(figment: Figment) -> AppResult<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.bridge.validate()?;
        self.resolution.validate()
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bridge.base_url, "http://localhost:8080");
        assert_eq!(config.bridge.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [bridge]
            base_url = "http://bridge.local:9000/"

            [resolution]
            progressive_only = false
            blocked_format_ids = "22"
            preflight_probe_bytes = 0

            [resolution.timeouts]
            http = 6000
            preflight = "1s"
            "#,
        )
        .unwrap();

        assert_eq!(config.bridge.normalized_base_url(), "http://bridge.local:9000");
        assert!(!config.resolution.progressive_only);
        assert!(config.resolution.is_blocked("22"));
        assert_eq!(config.resolution.preflight_probe_bytes, 0);
        assert_eq!(config.resolution.preflight_max_candidates, 5);
        assert_eq!(config.resolution.timeouts.fetch(), Duration::from_secs(6));
        assert_eq!(config.resolution.timeouts.preflight(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = Config::from_toml_str("[bridge]\nbase_url = \"ftp://bridge\"").unwrap_err();
        assert!(err.to_string().contains("http or https"));

        assert!(Config::from_toml_str("[bridge]\nbase_url = \"  \"").is_err());
    }

    #[test]
    fn test_rendered_config_reloads() {
        let mut config = Config::default();
        config.resolution.blocked_format_ids.insert("137".into());
        config.resolution.timeouts.preflight = Some(Duration::from_millis(2500));

        let rendered = config.to_toml_string().unwrap();
        let reloaded = Config::from_toml_str(&rendered).unwrap();
        assert_eq!(reloaded.resolution, config.resolution);
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "ytbridge.toml",
                r#"
                [bridge]
                base_url = "http://from-file:8080"
                [resolution]
                policy_first = false
                "#,
            )?;
            jail.set_env("YTBRIDGE_RESOLUTION__POLICY_FIRST", "true");
            jail.set_env("YTBRIDGE_RESOLUTION__BLOCKED_FORMAT_IDS", "22,18");

            let config = Config::load_from_file("ytbridge.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.bridge.base_url, "http://from-file:8080");
            assert!(config.resolution.policy_first);
            assert!(config.resolution.is_blocked("22"));
            assert!(config.resolution.is_blocked("18"));
            Ok(())
        });
    }
}

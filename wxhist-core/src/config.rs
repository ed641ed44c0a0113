use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{provider::ProviderId, service::FetchMode};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_FILTER: &str = "info";

/// Endpoint overrides for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// AccuWeather serves history from a separate host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_url: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// API keys are deliberately absent; see [`Config::api_key_from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Optional default provider id, e.g. "open-meteo" or "openweather".
    pub default_provider: Option<String>,

    pub http_timeout_secs: u64,

    pub fetch_mode: FetchMode,

    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Also write logs to a timestamped file in this directory.
    pub log_dir: Option<PathBuf>,

    pub geocoding_url: Option<String>,

    /// Example TOML:
    /// [providers.open-meteo]
    /// base_url = "http://localhost:8080"
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            fetch_mode: FetchMode::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
            geocoding_url: None,
            providers: HashMap::new(),
        }
    }
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    /// Falls back to Open-Meteo, which needs no key.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        match self.default_provider.as_deref() {
            Some(s) => ProviderId::try_from(s).with_context(|| {
                format!(
                    "Invalid default_provider in config.\n\
                     Hint: edit {} or pass --provider.",
                    Self::config_file_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|_| "the config file".to_string())
                )
            }),
            None => Ok(ProviderId::OpenMeteo),
        }
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    pub fn provider_base_url(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id)?.base_url.as_deref()
    }

    pub fn accuweather_historical_url(&self) -> Option<&str> {
        self.provider_config(ProviderId::AccuWeather)?
            .historical_url
            .as_deref()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Environment variable holding the API key for `id`,
    /// e.g. `WXHIST_OPENWEATHER_API_KEY`.
    pub fn api_key_env_var(id: ProviderId) -> String {
        format!(
            "WXHIST_{}_API_KEY",
            id.as_str().replace('-', "_").to_uppercase()
        )
    }

    /// API key for `id` from the environment, if set and non-blank.
    pub fn api_key_from_env(id: ProviderId) -> Option<String> {
        std::env::var(Self::api_key_env_var(id))
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Load config from the platform location, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform location, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wxhist", "wxhist")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

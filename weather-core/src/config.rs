use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::{error::WeatherError, model::UnitSystem, provider::ProviderId};

pub const VISUAL_CROSSING_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";
pub const OPEN_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const OPEN_WEATHER_GEO_BASE_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Configuration for a single provider (e.g., API key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Override of the provider's API root, mostly for testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// OpenWeatherMap only: override of the geocoding API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_base_url: Option<String>,
}

/// Heuristics used to synthesize alerts from OpenWeatherMap current conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRules {
    /// Wind speed in m/s above which a "High Wind Warning" is raised.
    #[serde(default = "default_wind_threshold")]
    pub wind_speed_threshold: f64,

    /// Condition keywords that trigger a "Severe Thunderstorm Warning".
    #[serde(default = "default_severe_keywords")]
    pub severe_keywords: Vec<String>,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            wind_speed_threshold: default_wind_threshold(),
            severe_keywords: default_severe_keywords(),
        }
    }
}

fn default_wind_threshold() -> f64 {
    15.0
}

fn default_severe_keywords() -> Vec<String> {
    vec!["thunderstorm".to_string(), "tornado".to_string()]
}

const fn default_timeout_secs() -> u64 {
    15
}

fn default_reference_city() -> String {
    "London".to_string()
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_units: UnitSystem,

    /// Per-request HTTP timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// City used by `weather status` to check providers.
    #[serde(default = "default_reference_city")]
    pub reference_city: String,

    /// Example TOML:
    /// [providers.visualcrossing]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub alerts: AlertRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_units: UnitSystem::default(),
            timeout_secs: default_timeout_secs(),
            reference_city: default_reference_city(),
            providers: HashMap::new(),
            alerts: AlertRules::default(),
        }
    }
}

/// Connection details for Visual Crossing.
#[derive(Debug, Clone)]
pub struct VisualCrossingEndpoint {
    pub api_key: String,
    pub base_url: String,
}

/// Connection details for OpenWeatherMap.
#[derive(Debug, Clone)]
pub struct OpenWeatherEndpoint {
    pub api_key: String,
    pub base_url: String,
    pub geo_base_url: String,
}

/// Everything the aggregator needs, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub visual_crossing: VisualCrossingEndpoint,
    pub open_weather: OpenWeatherEndpoint,
    pub timeout: Duration,
    pub reference_city: String,
    pub alert_rules: AlertRules,
}

impl ClientConfig {
    /// Defaults with the public API roots.
    pub fn new(
        visual_crossing_key: impl Into<String>,
        open_weather_key: impl Into<String>,
    ) -> Self {
        Self {
            visual_crossing: VisualCrossingEndpoint {
                api_key: visual_crossing_key.into(),
                base_url: VISUAL_CROSSING_BASE_URL.to_string(),
            },
            open_weather: OpenWeatherEndpoint {
                api_key: open_weather_key.into(),
                base_url: OPEN_WEATHER_BASE_URL.to_string(),
                geo_base_url: OPEN_WEATHER_GEO_BASE_URL.to_string(),
            },
            timeout: Duration::from_secs(default_timeout_secs()),
            reference_city: default_reference_city(),
            alert_rules: AlertRules::default(),
        }
    }
}

impl Config {
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider API key, keeping any URL overrides.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert(ProviderConfig {
                api_key,
                base_url: None,
                geo_base_url: None,
            });
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers
            .get(provider_id.as_str())
            .map(|cfg| cfg.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// Resolve the aggregator configuration. Both providers need a key.
    pub fn client_config(&self) -> Result<ClientConfig, WeatherError> {
        let vc_key = self
            .provider_api_key(ProviderId::VisualCrossing)
            .ok_or(WeatherError::MissingApiKey(ProviderId::VisualCrossing))?;
        let ow_key = self
            .provider_api_key(ProviderId::OpenWeather)
            .ok_or(WeatherError::MissingApiKey(ProviderId::OpenWeather))?;

        let mut client = ClientConfig::new(vc_key, ow_key);
        client.timeout = Duration::from_secs(self.timeout_secs);
        client.reference_city = self.reference_city.clone();
        client.alert_rules = self.alerts.clone();

        if let Some(url) = self.url_override(ProviderId::VisualCrossing, |p| &p.base_url) {
            client.visual_crossing.base_url = url;
        }
        if let Some(url) = self.url_override(ProviderId::OpenWeather, |p| &p.base_url) {
            client.open_weather.base_url = url;
        }
        if let Some(url) = self.url_override(ProviderId::OpenWeather, |p| &p.geo_base_url) {
            client.open_weather.geo_base_url = url;
        }

        Ok(client)
    }

    fn url_override(
        &self,
        id: ProviderId,
        field: impl Fn(&ProviderConfig) -> &Option<String>,
    ) -> Option<String> {
        self.provider_config(id)
            .and_then(|p| field(p).as_deref())
            .map(|url| url.trim_end_matches('/').to_string())
    }
}

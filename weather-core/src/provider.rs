use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{convert::TryFrom, fmt::Debug};
use tracing::debug;

use crate::{
    ClientConfig, WeatherError,
    error::ProviderError,
    model::{AlertRecord, CityCandidate, Coordinates, ForecastDay, UnitSystem, WeatherReading},
    provider::{openweather::OpenWeatherProvider, visualcrossing::VisualCrossingProvider},
};

pub mod openweather;
pub mod visualcrossing;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    VisualCrossing,
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::VisualCrossing => "visualcrossing",
            ProviderId::OpenWeather => "openweather",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::VisualCrossing => "Visual Crossing",
            ProviderId::OpenWeather => "OpenWeatherMap",
        }
    }

    /// Primary first, fallback second.
    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::VisualCrossing, ProviderId::OpenWeather]
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, ProviderId::VisualCrossing)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "visualcrossing" => Ok(ProviderId::VisualCrossing),
            "openweather" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: visualcrossing, openweather."
            )),
        }
    }
}

/// Result of one provider call.
#[derive(Debug)]
pub enum Outcome<T> {
    Data(T),
    /// The call succeeded but carried nothing usable.
    Empty,
    Failed(ProviderError),
}

impl<T> From<Result<Option<T>, ProviderError>> for Outcome<T> {
    fn from(result: Result<Option<T>, ProviderError>) -> Self {
        match result {
            Ok(Some(data)) => Outcome::Data(data),
            Ok(None) => Outcome::Empty,
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// One weather data source.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    async fn current(&self, city: &str, units: UnitSystem) -> Outcome<WeatherReading>;

    /// Daily records, at most `days` of them.
    async fn forecast(
        &self,
        city: &str,
        days: usize,
        units: UnitSystem,
    ) -> Outcome<Vec<ForecastDay>>;

    /// Alerts for a location. Providers that need coordinates get `None`
    /// when geocoding failed.
    async fn alerts(
        &self,
        city: &str,
        coordinates: Option<Coordinates>,
    ) -> Outcome<Vec<AlertRecord>>;
}

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn geocode(&self, query: &str, limit: usize) -> Outcome<Vec<CityCandidate>>;
}

/// Build the shared HTTP client with the configured per-call timeout.
pub fn http_client(config: &ClientConfig) -> Result<Client, WeatherError> {
    Client::builder()
        .timeout(config.timeout)
        .user_agent(concat!("weather-core/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(WeatherError::HttpClient)
}

/// Construct a provider from its config entry.
pub fn provider_from_config(
    id: ProviderId,
    config: &ClientConfig,
    http: Client,
) -> Box<dyn WeatherProvider> {
    match id {
        ProviderId::VisualCrossing => {
            Box::new(VisualCrossingProvider::new(config.visual_crossing.clone(), http))
        }
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(
            config.open_weather.clone(),
            config.alert_rules.clone(),
            http,
        )),
    }
}

/// Send `request` and decode a JSON body, treating non-2xx as failure.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    what: &str,
) -> Result<T, ProviderError> {
    let res = request.send().await?;

    let status = res.status();
    let body = res.text().await?;
    debug!(%status, bytes = body.len(), "{what} responded");

    if !status.is_success() {
        return Err(ProviderError::Status {
            status,
            body: truncate_body(&body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

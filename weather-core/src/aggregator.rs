//! Primary/secondary fallback over the two weather providers.

use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::ClientConfig,
    error::{WeatherError, require_non_blank},
    model::{AlertRecord, CityCandidate, Coordinates, ForecastDay, UnitSystem, WeatherReading},
    provider::{
        Geocoder, Outcome, ProviderId, WeatherProvider, http_client,
        openweather::OpenWeatherProvider, provider_from_config,
    },
};

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Provider-agnostic entry point for weather data.
#[derive(Debug)]
pub struct Aggregator {
    primary: Box<dyn WeatherProvider>,
    secondary: Box<dyn WeatherProvider>,
    geocoder: Box<dyn Geocoder>,
    reference_city: String,
}

impl Aggregator {
    /// Visual Crossing as primary, OpenWeatherMap as secondary and geocoder.
    pub fn new(config: &ClientConfig) -> Result<Self, WeatherError> {
        let http = http_client(config)?;

        let primary = provider_from_config(ProviderId::VisualCrossing, config, http.clone());
        let secondary = provider_from_config(ProviderId::OpenWeather, config, http.clone());
        let geocoder = OpenWeatherProvider::new(
            config.open_weather.clone(),
            config.alert_rules.clone(),
            http,
        );

        Ok(Self::from_parts(primary, secondary, Box::new(geocoder), config.reference_city.clone()))
    }

    pub fn from_parts(
        primary: Box<dyn WeatherProvider>,
        secondary: Box<dyn WeatherProvider>,
        geocoder: Box<dyn Geocoder>,
        reference_city: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            secondary,
            geocoder,
            reference_city: reference_city.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn current_conditions(
        &self,
        city: &str,
        units: UnitSystem,
    ) -> Result<WeatherReading, WeatherError> {
        let city = require_non_blank(city, "city")?;

        let outcome = self.primary.current(city, units).await;
        if let Some(reading) = accept(self.primary.id(), "current conditions", outcome) {
            return Ok(reading);
        }

        info!(fallback = %self.secondary.id(), "falling back for current conditions");
        let outcome = self.secondary.current(city, units).await;
        accept(self.secondary.id(), "current conditions", outcome)
            .ok_or_else(|| WeatherError::no_data("current conditions", city))
    }

    /// Up to `day_count` days; fewer when the provider has less.
    #[instrument(skip(self))]
    pub async fn forecast(
        &self,
        city: &str,
        day_count: usize,
        units: UnitSystem,
    ) -> Result<Vec<ForecastDay>, WeatherError> {
        let city = require_non_blank(city, "city")?;
        if day_count == 0 {
            return Err(WeatherError::MalformedInput("day count must be at least 1".into()));
        }

        let outcome = self.primary.forecast(city, day_count, units).await;
        let days = match accept(self.primary.id(), "forecast", outcome) {
            Some(days) => days,
            None => {
                info!(fallback = %self.secondary.id(), "falling back for forecast");
                let outcome = self.secondary.forecast(city, day_count, units).await;
                accept(self.secondary.id(), "forecast", outcome)
                    .ok_or_else(|| WeatherError::no_data("forecast", city))?
            }
        };

        Ok(days.into_iter().take(day_count).collect())
    }

    /// Alerts from both providers, primary first. Failed sub-calls add nothing.
    #[instrument(skip(self))]
    pub async fn alerts(&self, city: &str) -> Result<Vec<AlertRecord>, WeatherError> {
        let city = require_non_blank(city, "city")?;

        let coordinates = self
            .geocode(city, 1)
            .await
            .into_iter()
            .next()
            .map(|c| c.coordinates());
        if coordinates.is_none() {
            warn!(city, "could not resolve coordinates; coordinate-based alerts skipped");
        }

        let (primary, secondary) = tokio::join!(
            self.primary.alerts(city, coordinates),
            self.secondary.alerts(city, coordinates),
        );

        let mut alerts = accept(self.primary.id(), "alerts", primary).unwrap_or_default();
        alerts.extend(accept(self.secondary.id(), "alerts", secondary).unwrap_or_default());

        debug!(count = alerts.len(), "alerts collected");
        Ok(alerts)
    }

    /// Matching cities, empty on any failure.
    #[instrument(skip(self))]
    pub async fn search_cities(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CityCandidate>, WeatherError> {
        let query = require_non_blank(query, "search query")?;
        Ok(self.geocode(query, limit.max(1)).await)
    }

    /// First geocoding match for `city`.
    #[instrument(skip(self))]
    pub async fn resolve_coordinates(&self, city: &str) -> Result<Coordinates, WeatherError> {
        let city = require_non_blank(city, "city")?;

        self.geocode(city, 1)
            .await
            .first()
            .map(CityCandidate::coordinates)
            .ok_or_else(|| WeatherError::no_data("location", city))
    }

    /// Check each provider once with the reference city.
    #[instrument(skip(self))]
    pub async fn validate_providers(&self) -> BTreeMap<ProviderId, bool> {
        let city = self.reference_city.as_str();
        let (primary, secondary) = tokio::join!(
            self.primary.current(city, UnitSystem::Metric),
            self.secondary.current(city, UnitSystem::Metric),
        );

        BTreeMap::from([
            (self.primary.id(), accept(self.primary.id(), "status check", primary).is_some()),
            (self.secondary.id(), accept(self.secondary.id(), "status check", secondary).is_some()),
        ])
    }

    async fn geocode(&self, query: &str, limit: usize) -> Vec<CityCandidate> {
        let outcome = self.geocoder.geocode(query, limit).await;
        accept(ProviderId::OpenWeather, "geocoding", outcome).unwrap_or_default()
    }
}

/// Keep data, log the rest.
fn accept<T>(provider: ProviderId, what: &str, outcome: Outcome<T>) -> Option<T> {
    match outcome {
        Outcome::Data(data) => Some(data),
        Outcome::Empty => {
            info!(%provider, "{what}: no data");
            None
        }
        Outcome::Failed(err) => {
            warn!(%provider, error = %err, "{what}: provider unavailable");
            None
        }
    }
}

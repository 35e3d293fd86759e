use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::{
    config::{AlertRules, OpenWeatherEndpoint},
    error::ProviderError,
    forecast::{ForecastSample, aggregate_daily},
    model::{
        AlertRecord, CityCandidate, Coordinates, ForecastDay, UnitSystem, WeatherReading, WindUnit,
    },
    provider::{Geocoder, Outcome, ProviderId, WeatherProvider, fetch_json},
};

/// Secondary provider and geocoder: OpenWeatherMap.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    endpoint: OpenWeatherEndpoint,
    rules: AlertRules,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(endpoint: OpenWeatherEndpoint, rules: AlertRules, http: Client) -> Self {
        Self {
            endpoint,
            rules,
            http,
        }
    }

    async fn fetch_current(
        &self,
        city: &str,
        units: UnitSystem,
    ) -> Result<Option<WeatherReading>, ProviderError> {
        let url = format!("{}/weather", self.endpoint.base_url);
        let request = self.http.get(url).query(&[
            ("q", city),
            ("appid", self.endpoint.api_key.as_str()),
            ("units", units.open_weather_units()),
        ]);

        let parsed: OwCurrentResponse = fetch_json(request, "OpenWeatherMap current").await?;
        if parsed.main.is_none() && parsed.weather.is_empty() {
            return Ok(None);
        }

        Ok(Some(current_reading(parsed, city, units)))
    }

    async fn fetch_forecast(
        &self,
        city: &str,
        days: usize,
        units: UnitSystem,
    ) -> Result<Option<Vec<ForecastDay>>, ProviderError> {
        let url = format!("{}/forecast", self.endpoint.base_url);
        let request = self.http.get(url).query(&[
            ("q", city),
            ("appid", self.endpoint.api_key.as_str()),
            ("units", units.open_weather_units()),
        ]);

        let parsed: OwForecastResponse = fetch_json(request, "OpenWeatherMap forecast").await?;

        let offset = parsed
            .city
            .as_ref()
            .and_then(|c| c.timezone)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(utc_offset);

        let samples: Vec<ForecastSample> =
            parsed.list.iter().filter_map(|entry| forecast_sample(entry, offset)).collect();

        let forecast = aggregate_daily(
            &samples,
            days,
            WindUnit::native(ProviderId::OpenWeather, units),
            ProviderId::OpenWeather,
        );

        Ok(Some(forecast).filter(|f| !f.is_empty()))
    }

    async fn fetch_alerts(
        &self,
        coordinates: Coordinates,
    ) -> Result<Option<Vec<AlertRecord>>, ProviderError> {
        let url = format!("{}/weather", self.endpoint.base_url);
        // Metric so the wind threshold is in m/s.
        let request = self.http.get(url).query(&[
            ("lat", coordinates.lat.to_string().as_str()),
            ("lon", coordinates.lon.to_string().as_str()),
            ("appid", self.endpoint.api_key.as_str()),
            ("units", UnitSystem::Metric.open_weather_units()),
        ]);

        let parsed: OwCurrentResponse = fetch_json(request, "OpenWeatherMap alerts").await?;
        let alerts = synthesize_alerts(&parsed, &self.rules, Utc::now());

        Ok(Some(alerts).filter(|a| !a.is_empty()))
    }

    async fn fetch_geocode(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Option<Vec<CityCandidate>>, ProviderError> {
        let url = format!("{}/direct", self.endpoint.geo_base_url);
        let request = self.http.get(url).query(&[
            ("q", query),
            ("limit", limit.to_string().as_str()),
            ("appid", self.endpoint.api_key.as_str()),
        ]);

        let parsed: Vec<OwGeoEntry> = fetch_json(request, "OpenWeatherMap geocoding").await?;
        let candidates: Vec<CityCandidate> = parsed
            .into_iter()
            .filter_map(|entry| {
                Some(CityCandidate {
                    name: entry.name.unwrap_or_default(),
                    country: entry.country.unwrap_or_default(),
                    state: entry.state.filter(|s| !s.is_empty()),
                    lat: entry.lat?,
                    lon: entry.lon?,
                })
            })
            .take(limit)
            .collect();

        Ok(Some(candidates).filter(|c| !c.is_empty()))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    #[instrument(skip(self), fields(provider = "openweather"))]
    async fn current(&self, city: &str, units: UnitSystem) -> Outcome<WeatherReading> {
        self.fetch_current(city, units).await.into()
    }

    #[instrument(skip(self), fields(provider = "openweather"))]
    async fn forecast(
        &self,
        city: &str,
        days: usize,
        units: UnitSystem,
    ) -> Outcome<Vec<ForecastDay>> {
        self.fetch_forecast(city, days, units).await.into()
    }

    #[instrument(skip(self), fields(provider = "openweather"))]
    async fn alerts(
        &self,
        _city: &str,
        coordinates: Option<Coordinates>,
    ) -> Outcome<Vec<AlertRecord>> {
        match coordinates {
            Some(coordinates) => self.fetch_alerts(coordinates).await.into(),
            None => Outcome::Empty,
        }
    }
}

#[async_trait]
impl Geocoder for OpenWeatherProvider {
    #[instrument(skip(self), fields(provider = "openweather"))]
    async fn geocode(&self, query: &str, limit: usize) -> Outcome<Vec<CityCandidate>> {
        self.fetch_geocode(query, limit).await.into()
    }
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: Option<f64>,
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: Option<String>,
    dt: Option<i64>,
    main: Option<OwMain>,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
    /// Metres.
    visibility: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    /// Shift from UTC in seconds.
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    #[serde(default)]
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: Option<OwCity>,
    #[serde(default)]
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: Option<String>,
    country: Option<String>,
    state: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn current_reading(parsed: OwCurrentResponse, city: &str, units: UnitSystem) -> WeatherReading {
    let main = parsed.main.unwrap_or_default();
    let weather = parsed.weather.into_iter().next();

    WeatherReading {
        city: parsed.name.filter(|n| !n.is_empty()).unwrap_or_else(|| city.to_string()),
        country: parsed.sys.country.unwrap_or_default(),
        temperature: main.temp.unwrap_or_default(),
        feels_like: main.feels_like.unwrap_or_default(),
        humidity_pct: main.humidity.unwrap_or_default(),
        pressure_hpa: main.pressure.unwrap_or_default(),
        wind_speed: parsed.wind.speed.unwrap_or_default(),
        wind_unit: WindUnit::native(ProviderId::OpenWeather, units),
        wind_direction_deg: parsed.wind.deg.unwrap_or_default(),
        visibility_km: parsed.visibility.unwrap_or_default() / 1000.0,
        description: weather.as_ref().map(|w| w.description.clone()).unwrap_or_default(),
        icon: weather.map(|w| w.icon).unwrap_or_default(),
        sunrise: parsed.sys.sunrise.and_then(unix_to_utc),
        sunset: parsed.sys.sunset.and_then(unix_to_utc),
        source: ProviderId::OpenWeather,
        observed_at: parsed.dt.and_then(unix_to_utc).unwrap_or_else(Utc::now),
        units,
    }
}

fn forecast_sample(entry: &OwForecastEntry, offset: FixedOffset) -> Option<ForecastSample> {
    let when = unix_to_utc(entry.dt)?.with_timezone(&offset);

    Some(ForecastSample {
        date: when.date_naive(),
        temp: entry.main.temp.unwrap_or_default(),
        humidity_pct: entry.main.humidity.unwrap_or_default(),
        wind_speed: entry.wind.speed.unwrap_or_default(),
        pressure_hpa: entry.main.pressure.unwrap_or_default(),
        precip_probability: entry.pop.unwrap_or_default(),
        description: entry.weather.first().map(|w| w.description.clone()).unwrap_or_default(),
    })
}

/// Derive alerts from current conditions: severe keywords in the condition
/// text, and wind (m/s) above the configured threshold.
fn synthesize_alerts(
    parsed: &OwCurrentResponse,
    rules: &AlertRules,
    now: DateTime<Utc>,
) -> Vec<AlertRecord> {
    let mut alerts = Vec::new();
    let Some(weather) = parsed.weather.first() else {
        return alerts;
    };

    let condition = format!("{} {}", weather.main, weather.description).to_lowercase();
    let start = Some(now.to_rfc3339());

    if rules.severe_keywords.iter().any(|k| condition.contains(&k.to_lowercase())) {
        alerts.push(AlertRecord {
            event: "Severe Thunderstorm Warning".to_string(),
            description: format!("Severe weather detected: {}", weather.description),
            severity: "Severe".to_string(),
            start: start.clone(),
            end: None,
            source: ProviderId::OpenWeather,
        });
    }

    let wind = parsed.wind.speed.unwrap_or_default();
    if wind > rules.wind_speed_threshold {
        alerts.push(AlertRecord {
            event: "High Wind Warning".to_string(),
            description: format!("Strong winds detected: {wind} m/s"),
            severity: "Moderate".to_string(),
            start,
            end: None,
            source: ProviderId::OpenWeather,
        });
    }

    alerts
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse_current(json: &str) -> OwCurrentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn thunderstorm_and_wind_alerts() {
        let parsed = parse_current(
            r#"{"weather":[{"main":"Thunderstorm","description":"heavy thunderstorm"}],
                "wind":{"speed":18.5}}"#,
        );

        let alerts = synthesize_alerts(&parsed, &AlertRules::default(), Utc::now());
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].severity, "Severe");
        assert_eq!(alerts[0].event, "Severe Thunderstorm Warning");
        assert_eq!(alerts[1].severity, "Moderate");
        assert!(alerts[1].description.contains("18.5 m/s"));
    }

    #[test]
    fn calm_weather_has_no_alerts() {
        let parsed = parse_current(
            r#"{"weather":[{"main":"Clear","description":"clear sky"}],"wind":{"speed":15.0}}"#,
        );
        assert!(synthesize_alerts(&parsed, &AlertRules::default(), Utc::now()).is_empty());
    }

    #[test]
    fn thresholds_are_configurable() {
        let parsed = parse_current(
            r#"{"weather":[{"main":"Squall","description":"squalls"}],"wind":{"speed":9.0}}"#,
        );
        let rules = AlertRules {
            wind_speed_threshold: 8.0,
            severe_keywords: vec!["Squall".into()],
        };

        let alerts = synthesize_alerts(&parsed, &rules, Utc::now());
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn current_reading_converts_visibility_and_fills_defaults() {
        let parsed = parse_current(
            r#"{"name":"","main":{"temp":15.2,"pressure":1009},"visibility":8000,
                "weather":[{"description":"light rain","icon":"10d"}]}"#,
        );

        let reading = current_reading(parsed, "London", UnitSystem::Metric);
        assert_eq!(reading.city, "London");
        assert_eq!(reading.visibility_km, 8.0);
        assert_eq!(reading.pressure_hpa, 1009.0);
        assert_eq!(reading.humidity_pct, 0.0);
        assert_eq!(reading.wind_unit, WindUnit::MetersPerSecond);
        assert!(reading.sunrise.is_none());
        assert_eq!(reading.source, ProviderId::OpenWeather);
    }

    #[test]
    fn samples_use_city_offset_for_dates() {
        // 2024-06-03T22:00:00Z is already June 4th at UTC+3.
        let entry: OwForecastEntry =
            serde_json::from_str(r#"{"dt":1717452000,"main":{"temp":20.0},"pop":0.4}"#).unwrap();

        let utc = forecast_sample(&entry, utc_offset()).unwrap();
        assert_eq!(utc.date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());

        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        let local = forecast_sample(&entry, plus_three).unwrap();
        assert_eq!(local.date, NaiveDate::from_ymd_opt(2024, 6, 4).unwrap());
        assert_eq!(local.precip_probability, 0.4);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::{
    config::VisualCrossingEndpoint,
    error::ProviderError,
    model::{AlertRecord, Coordinates, ForecastDay, UnitSystem, WeatherReading, WindUnit},
    provider::{Outcome, ProviderId, WeatherProvider, fetch_json},
};

/// The timeline API serves at most this many days.
pub const MAX_FORECAST_DAYS: usize = 15;

const INHG_TO_HPA: f64 = 33.8639;
const MILES_TO_KM: f64 = 1.609344;

/// Primary provider: the Visual Crossing timeline API.
#[derive(Debug, Clone)]
pub struct VisualCrossingProvider {
    endpoint: VisualCrossingEndpoint,
    http: Client,
}

impl VisualCrossingProvider {
    pub fn new(endpoint: VisualCrossingEndpoint, http: Client) -> Self {
        Self { endpoint, http }
    }

    /// `{base}/{city}/{period...}` with every segment percent-encoded.
    fn timeline_url(&self, city: &str, period: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.endpoint.base_url)
            .map_err(|e| ProviderError::Url(format!("{}: {e}", self.endpoint.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Url(self.endpoint.base_url.clone()))?
            .pop_if_empty()
            .push(city)
            .extend(period);
        Ok(url)
    }

    async fn timeline(
        &self,
        city: &str,
        period: &[&str],
        include: &str,
        units: UnitSystem,
    ) -> Result<VcTimeline, ProviderError> {
        let url = self.timeline_url(city, period)?;
        let request = self.http.get(url).query(&[
            ("key", self.endpoint.api_key.as_str()),
            ("unitGroup", units.visual_crossing_group()),
            ("include", include),
            ("contentType", "json"),
        ]);

        fetch_json(request, "Visual Crossing timeline").await
    }

    async fn fetch_current(
        &self,
        city: &str,
        units: UnitSystem,
    ) -> Result<Option<WeatherReading>, ProviderError> {
        let parsed = self.timeline(city, &["today"], "current", units).await?;

        let Some(current) = parsed.current_conditions else {
            return Ok(None);
        };

        let (name, country) = split_address(parsed.resolved_address.as_deref(), city);

        Ok(Some(WeatherReading {
            city: name,
            country,
            temperature: current.temp.unwrap_or_default(),
            feels_like: current.feelslike.unwrap_or_default(),
            humidity_pct: current.humidity.unwrap_or_default(),
            pressure_hpa: normalize_pressure(current.pressure),
            wind_speed: current.windspeed.unwrap_or_default(),
            wind_unit: WindUnit::native(ProviderId::VisualCrossing, units),
            wind_direction_deg: current.winddir.unwrap_or_default(),
            visibility_km: normalize_visibility(current.visibility, units),
            description: current.conditions.unwrap_or_default(),
            icon: icon_code(current.icon.as_deref().unwrap_or_default()).to_string(),
            sunrise: current.sunrise_epoch.and_then(unix_to_utc),
            sunset: current.sunset_epoch.and_then(unix_to_utc),
            source: ProviderId::VisualCrossing,
            observed_at: current.datetime_epoch.and_then(unix_to_utc).unwrap_or_else(Utc::now),
            units,
        }))
    }

    async fn fetch_forecast(
        &self,
        city: &str,
        days: usize,
        units: UnitSystem,
    ) -> Result<Option<Vec<ForecastDay>>, ProviderError> {
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        let end = forecast_end_date(Local::now().date_naive(), days).format("%Y-%m-%d").to_string();

        let parsed = self.timeline(city, &["today", end.as_str()], "days", units).await?;

        let wind_unit = WindUnit::native(ProviderId::VisualCrossing, units);
        let forecast: Vec<ForecastDay> = parsed
            .days
            .into_iter()
            .filter_map(|day| daily_record(day, wind_unit))
            .take(days)
            .collect();

        Ok(Some(forecast).filter(|f| !f.is_empty()))
    }

    async fn fetch_alerts(&self, city: &str) -> Result<Option<Vec<AlertRecord>>, ProviderError> {
        let parsed = self.timeline(city, &["today"], "alerts", UnitSystem::Metric).await?;

        let alerts: Vec<AlertRecord> = parsed
            .alerts
            .into_iter()
            .map(|alert| AlertRecord {
                event: alert.event.unwrap_or_else(|| "Weather Alert".to_string()),
                description: alert
                    .description
                    .unwrap_or_else(|| "Weather alert in effect".to_string()),
                severity: alert.severity.unwrap_or_else(|| "Unknown".to_string()),
                start: alert.onset,
                end: alert.ends,
                source: ProviderId::VisualCrossing,
            })
            .collect();

        Ok(Some(alerts).filter(|a| !a.is_empty()))
    }
}

#[async_trait]
impl WeatherProvider for VisualCrossingProvider {
    fn id(&self) -> ProviderId {
        ProviderId::VisualCrossing
    }

    #[instrument(skip(self), fields(provider = "visualcrossing"))]
    async fn current(&self, city: &str, units: UnitSystem) -> Outcome<WeatherReading> {
        self.fetch_current(city, units).await.into()
    }

    #[instrument(skip(self), fields(provider = "visualcrossing"))]
    async fn forecast(
        &self,
        city: &str,
        days: usize,
        units: UnitSystem,
    ) -> Outcome<Vec<ForecastDay>> {
        self.fetch_forecast(city, days, units).await.into()
    }

    #[instrument(skip(self, _coordinates), fields(provider = "visualcrossing"))]
    async fn alerts(
        &self,
        city: &str,
        _coordinates: Option<Coordinates>,
    ) -> Outcome<Vec<AlertRecord>> {
        self.fetch_alerts(city).await.into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VcTimeline {
    resolved_address: Option<String>,
    current_conditions: Option<VcConditions>,
    #[serde(default)]
    days: Vec<VcDay>,
    #[serde(default)]
    alerts: Vec<VcAlert>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VcConditions {
    temp: Option<f64>,
    feelslike: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    windspeed: Option<f64>,
    winddir: Option<f64>,
    visibility: Option<f64>,
    conditions: Option<String>,
    icon: Option<String>,
    sunrise_epoch: Option<i64>,
    sunset_epoch: Option<i64>,
    datetime_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VcDay {
    datetime: String,
    tempmin: Option<f64>,
    tempmax: Option<f64>,
    humidity: Option<f64>,
    windspeed: Option<f64>,
    pressure: Option<f64>,
    conditions: Option<String>,
    precipprob: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VcAlert {
    event: Option<String>,
    description: Option<String>,
    severity: Option<String>,
    onset: Option<String>,
    #[serde(alias = "expires")]
    ends: Option<String>,
}

fn daily_record(day: VcDay, wind_unit: WindUnit) -> Option<ForecastDay> {
    let date = match NaiveDate::parse_from_str(&day.datetime, "%Y-%m-%d") {
        Ok(date) => date,
        Err(e) => {
            warn!(datetime = %day.datetime, error = %e, "skipping forecast day with bad date");
            return None;
        }
    };

    let min = day.tempmin.unwrap_or_default();
    let max = day.tempmax.unwrap_or_default();

    Some(ForecastDay {
        date,
        weekday: date.format("%A").to_string(),
        min_temp: min.min(max),
        max_temp: max.max(min),
        humidity_pct: day.humidity.unwrap_or_default(),
        wind_speed: day.windspeed.unwrap_or_default(),
        wind_unit,
        pressure_hpa: normalize_pressure(day.pressure),
        description: day.conditions.unwrap_or_default(),
        precip_probability: crate::forecast::percent(day.precipprob.unwrap_or_default()),
        source: ProviderId::VisualCrossing,
    })
}

/// End of the requested window, `days` past the machine's `today`.
///
/// The extra day covers locations already a day ahead of this machine;
/// surplus days are trimmed by the caller.
fn forecast_end_date(today: NaiveDate, days: usize) -> NaiveDate {
    let span = u64::try_from(days.min(MAX_FORECAST_DAYS)).unwrap_or_default();
    today.checked_add_days(Days::new(span)).unwrap_or(today)
}

/// Pressure in hPa. Values in the inches-of-mercury range are converted;
/// sea-level pressure in hPa never falls that low.
pub(crate) fn normalize_pressure(raw: Option<f64>) -> f64 {
    match raw {
        Some(p) if p > 0.0 && p < 200.0 => p * INHG_TO_HPA,
        Some(p) => p,
        None => 0.0,
    }
}

/// Visibility in km; the `us` unit group reports miles.
fn normalize_visibility(raw: Option<f64>, units: UnitSystem) -> f64 {
    let raw = raw.unwrap_or_default();
    match units {
        UnitSystem::Metric => raw,
        UnitSystem::Imperial => raw * MILES_TO_KM,
    }
}

/// "London, England, United Kingdom" -> ("London", "United Kingdom").
fn split_address(resolved: Option<&str>, fallback: &str) -> (String, String) {
    let address = resolved.unwrap_or(fallback);
    let name = address.split(',').next().unwrap_or(address).trim().to_string();
    let country = match address.rsplit_once(',') {
        Some((_, last)) => last.trim().to_string(),
        None => String::new(),
    };
    (name, country)
}

/// Map a Visual Crossing icon name to an OpenWeatherMap-style icon code.
pub fn icon_code(vc_icon: &str) -> &'static str {
    match vc_icon {
        "clear-day" => "01d",
        "clear-night" => "01n",
        "partly-cloudy-day" => "02d",
        "partly-cloudy-night" => "02n",
        "cloudy" => "03d",
        "fog" | "wind" => "50d",
        "rain" => "10d",
        "sleet" | "snow" | "hail" => "13d",
        _ => "01d",
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

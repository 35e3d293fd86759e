use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::provider::ProviderId;

/// Unit system requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    /// Value of Visual Crossing's `unitGroup` parameter.
    pub fn visual_crossing_group(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "us",
        }
    }

    /// Value of OpenWeatherMap's `units` parameter.
    pub fn open_weather_units(&self) -> &'static str {
        self.as_str()
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "°C",
            UnitSystem::Imperial => "°F",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitSystem {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{s}'. Supported values: metric, imperial."
            )),
        }
    }
}

/// Wind speed unit as delivered by a provider for a given unit system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindUnit {
    MetersPerSecond,
    KilometersPerHour,
    MilesPerHour,
}

impl WindUnit {
    /// Native wind unit of `provider` when queried with `units`.
    pub fn native(provider: ProviderId, units: UnitSystem) -> Self {
        match (provider, units) {
            (_, UnitSystem::Imperial) => WindUnit::MilesPerHour,
            (ProviderId::VisualCrossing, UnitSystem::Metric) => WindUnit::KilometersPerHour,
            (ProviderId::OpenWeather, UnitSystem::Metric) => WindUnit::MetersPerSecond,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WindUnit::MetersPerSecond => "m/s",
            WindUnit::KilometersPerHour => "km/h",
            WindUnit::MilesPerHour => "mph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// Current conditions, normalized across providers.
///
/// Pressure is always hectopascals and visibility kilometres; temperature
/// follows `units` and wind speed is in `wind_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub wind_speed: f64,
    pub wind_unit: WindUnit,
    pub wind_direction_deg: f64,
    pub visibility_km: f64,
    pub description: String,
    pub icon: String,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub source: ProviderId,
    pub observed_at: DateTime<Utc>,
    pub units: UnitSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub weekday: String,
    pub min_temp: f64,
    pub max_temp: f64,
    pub humidity_pct: f64,
    pub wind_speed: f64,
    pub wind_unit: WindUnit,
    pub pressure_hpa: f64,
    pub description: String,
    /// Integer percentage, 0..=100.
    pub precip_probability: u8,
    pub source: ProviderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub event: String,
    pub description: String,
    /// Provider label such as "Severe", "Moderate" or "Unknown". Not ranked.
    pub severity: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub source: ProviderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityCandidate {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl CityCandidate {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// "Name, State, CC", skipping empty parts.
    pub fn label(&self) -> String {
        [Some(self.name.as_str()), self.state.as_deref(), Some(self.country.as_str())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

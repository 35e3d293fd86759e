use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{
    error::{WeatherError, require_non_blank},
    model::{AlertRecord, ForecastDay, UnitSystem, WeatherReading},
};

/// Point-in-time dump of everything fetched for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub city: String,
    pub timestamp: DateTime<Local>,
    pub app_version: String,
    pub current_weather: Option<WeatherReading>,
    pub forecast_data: Vec<ForecastDay>,
    pub alerts_data: Vec<AlertRecord>,
    pub units: UnitSystem,
}

impl Snapshot {
    pub fn new(
        city: &str,
        units: UnitSystem,
        current_weather: Option<WeatherReading>,
        forecast_data: Vec<ForecastDay>,
        alerts_data: Vec<AlertRecord>,
    ) -> Result<Self, WeatherError> {
        let city = require_non_blank(city, "city")?;

        Ok(Self {
            city: city.to_string(),
            timestamp: Local::now(),
            app_version: concat!("weather ", env!("CARGO_PKG_VERSION")).to_string(),
            current_weather,
            forecast_data,
            alerts_data,
            units,
        })
    }

    /// `weather_data_<city>_<YYYYmmdd_HHMMSS>.json`
    pub fn file_name(&self) -> String {
        format!(
            "weather_data_{}_{}.json",
            sanitize_city(&self.city),
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write pretty JSON into `dir`, creating it if needed. Returns the path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, WeatherError> {
        fs::create_dir_all(dir).map_err(|e| {
            WeatherError::Export(format!("cannot create {}: {e}", dir.display()))
        })?;

        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| WeatherError::Export(format!("cannot serialize snapshot: {e}")))?;

        fs::write(&path, json)
            .map_err(|e| WeatherError::Export(format!("cannot write {}: {e}", path.display())))?;

        info!(path = %path.display(), "snapshot written");
        Ok(path)
    }
}

/// Replace everything but ASCII letters and digits with `_`.
pub fn sanitize_city(city: &str) -> String {
    city.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

//! Display-ready views of normalized records.
//!
//! Everything here is pure: the same record and time zone always produce the
//! same output. Absent values become zero or an empty string.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use std::fmt;

use crate::model::{AlertRecord, ForecastDay, WeatherReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherIcon {
    Sunny,
    PartlyCloudy,
    FewClouds,
    Cloudy,
    LightRain,
    Rain,
    HeavyRain,
    Thunderstorm,
    Snow,
    Sleet,
    Fog,
}

impl WeatherIcon {
    pub fn glyph(&self) -> &'static str {
        match self {
            WeatherIcon::Sunny => "☀️",
            WeatherIcon::PartlyCloudy => "⛅",
            WeatherIcon::FewClouds => "🌤️",
            WeatherIcon::Cloudy => "☁️",
            WeatherIcon::LightRain => "🌦️",
            WeatherIcon::Rain => "🌧️",
            WeatherIcon::HeavyRain | WeatherIcon::Thunderstorm => "⛈️",
            WeatherIcon::Snow => "❄️",
            WeatherIcon::Sleet => "🌨️",
            WeatherIcon::Fog => "🌫️",
        }
    }
}

/// Keyword table for [`weather_icon`]. Order matters: the first keyword found
/// in the description wins, so specific phrases precede generic ones.
const ICON_KEYWORDS: &[(&str, WeatherIcon)] = &[
    ("clear", WeatherIcon::Sunny),
    ("sunny", WeatherIcon::Sunny),
    ("partly cloudy", WeatherIcon::PartlyCloudy),
    ("few clouds", WeatherIcon::FewClouds),
    ("scattered clouds", WeatherIcon::PartlyCloudy),
    ("broken clouds", WeatherIcon::Cloudy),
    ("overcast", WeatherIcon::Cloudy),
    ("cloudy", WeatherIcon::Cloudy),
    ("light rain", WeatherIcon::LightRain),
    ("moderate rain", WeatherIcon::Rain),
    ("heavy rain", WeatherIcon::HeavyRain),
    ("rain", WeatherIcon::Rain),
    ("thunderstorm", WeatherIcon::Thunderstorm),
    ("snow", WeatherIcon::Snow),
    ("sleet", WeatherIcon::Sleet),
    ("mist", WeatherIcon::Fog),
    ("fog", WeatherIcon::Fog),
    ("haze", WeatherIcon::Fog),
    ("drizzle", WeatherIcon::LightRain),
    ("shower", WeatherIcon::LightRain),
];

pub const DEFAULT_WEATHER_ICON: WeatherIcon = WeatherIcon::PartlyCloudy;

/// Icon for a free-text condition, matched case-insensitively.
pub fn weather_icon(description: &str) -> WeatherIcon {
    let description = description.to_lowercase();
    ICON_KEYWORDS
        .iter()
        .find(|(keyword, _)| description.contains(keyword))
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_WEATHER_ICON)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertIcon {
    Critical,
    Warning,
    Generic,
}

impl AlertIcon {
    pub fn glyph(&self) -> &'static str {
        match self {
            AlertIcon::Critical => "🚨",
            AlertIcon::Warning => "⚠️",
            AlertIcon::Generic => "⚡",
        }
    }
}

pub fn alert_icon(severity: &str) -> AlertIcon {
    let severity = severity.to_lowercase();
    if severity.contains("severe") || severity.contains("extreme") {
        AlertIcon::Critical
    } else if severity.contains("moderate") || severity.contains("minor") {
        AlertIcon::Warning
    } else {
        AlertIcon::Generic
    }
}

/// Nearest integer; non-finite values become 0.
pub fn round_whole(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

/// One decimal place; non-finite values become 0.0.
pub fn round_tenth(value: f64) -> f64 {
    if value.is_finite() {
        (value * 10.0).round() / 10.0
    } else {
        0.0
    }
}

/// "HH:MM" in `tz`, or "" when absent.
pub fn format_clock<Tz: TimeZone>(ts: Option<DateTime<Utc>>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    ts.map(|ts| ts.with_timezone(tz).format("%H:%M").to_string()).unwrap_or_default()
}

pub fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

/// Weekday for an ISO "YYYY-MM-DD" date, or "" when it doesn't parse.
pub fn weekday_from_iso(date: &str) -> String {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map(weekday_name).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayReading {
    pub city: String,
    pub country: String,
    pub temperature: i64,
    pub feels_like: i64,
    pub temperature_unit: &'static str,
    pub description: String,
    pub icon: WeatherIcon,
    pub humidity: i64,
    pub pressure: i64,
    pub wind_speed: f64,
    pub wind_unit: &'static str,
    pub wind_direction: i64,
    pub visibility_km: f64,
    pub sunrise: String,
    pub sunset: String,
    pub updated: String,
    pub source: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayForecastDay {
    pub date: String,
    pub day_name: String,
    pub min_temp: i64,
    pub max_temp: i64,
    pub description: String,
    pub icon: WeatherIcon,
    pub humidity: i64,
    pub wind_speed: f64,
    pub wind_unit: &'static str,
    pub pressure: i64,
    pub precip_probability: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayAlert {
    pub title: String,
    pub description: String,
    pub severity: String,
    pub start_time: String,
    pub end_time: String,
    pub source: &'static str,
    pub icon: AlertIcon,
}

/// Builds display records, rendering times in `Tz`.
#[derive(Debug, Clone)]
pub struct Formatter<Tz: TimeZone> {
    tz: Tz,
}

impl Formatter<Local> {
    /// Times in the machine's local zone.
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl<Tz: TimeZone> Formatter<Tz>
where
    Tz::Offset: fmt::Display,
{
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn reading(&self, reading: &WeatherReading) -> DisplayReading {
        DisplayReading {
            city: reading.city.clone(),
            country: reading.country.clone(),
            temperature: round_whole(reading.temperature),
            feels_like: round_whole(reading.feels_like),
            temperature_unit: reading.units.temperature_label(),
            description: reading.description.clone(),
            icon: weather_icon(&reading.description),
            humidity: round_whole(reading.humidity_pct),
            pressure: round_whole(reading.pressure_hpa),
            wind_speed: round_tenth(reading.wind_speed),
            wind_unit: reading.wind_unit.label(),
            wind_direction: round_whole(reading.wind_direction_deg),
            visibility_km: round_tenth(reading.visibility_km),
            sunrise: format_clock(reading.sunrise, &self.tz),
            sunset: format_clock(reading.sunset, &self.tz),
            updated: reading
                .observed_at
                .with_timezone(&self.tz)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            source: reading.source.display_name(),
        }
    }

    pub fn forecast_day(&self, day: &ForecastDay) -> DisplayForecastDay {
        DisplayForecastDay {
            date: day.date.format("%Y-%m-%d").to_string(),
            day_name: weekday_name(day.date),
            min_temp: round_whole(day.min_temp),
            max_temp: round_whole(day.max_temp),
            description: day.description.clone(),
            icon: weather_icon(&day.description),
            humidity: round_whole(day.humidity_pct),
            wind_speed: round_tenth(day.wind_speed),
            wind_unit: day.wind_unit.label(),
            pressure: round_whole(day.pressure_hpa),
            precip_probability: day.precip_probability.min(100),
        }
    }

    pub fn forecast(&self, days: &[ForecastDay]) -> Vec<DisplayForecastDay> {
        days.iter().map(|day| self.forecast_day(day)).collect()
    }

    pub fn alert(&self, alert: &AlertRecord) -> DisplayAlert {
        DisplayAlert {
            title: non_empty_or(&alert.event, "Weather Alert"),
            description: non_empty_or(&alert.description, "Alert in effect"),
            severity: non_empty_or(&alert.severity, "Unknown"),
            start_time: alert.start.clone().unwrap_or_default(),
            end_time: alert.end.clone().unwrap_or_default(),
            source: alert.source.display_name(),
            icon: alert_icon(&alert.severity),
        }
    }

    pub fn alerts(&self, alerts: &[AlertRecord]) -> Vec<DisplayAlert> {
        alerts.iter().map(|alert| self.alert(alert)).collect()
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

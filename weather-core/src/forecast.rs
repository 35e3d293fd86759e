//! Daily aggregation of sub-daily forecast samples.

use chrono::NaiveDate;

use crate::{
    model::{ForecastDay, WindUnit},
    provider::ProviderId,
};

/// One sub-daily forecast step, already in normalized units.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    /// Calendar date of the sample in the forecast location's time zone.
    pub date: NaiveDate,
    pub temp: f64,
    pub humidity_pct: f64,
    pub wind_speed: f64,
    pub pressure_hpa: f64,
    /// Fraction in 0.0..=1.0.
    pub precip_probability: f64,
    pub description: String,
}

/// Group samples by date, in order of first appearance, and fold each group
/// into a [`ForecastDay`]. At most `max_days` days are returned.
///
/// Samples are not deduplicated: a repeated sample weighs into the means
/// once per occurrence, while min/max are unaffected.
pub fn aggregate_daily(
    samples: &[ForecastSample],
    max_days: usize,
    wind_unit: WindUnit,
    source: ProviderId,
) -> Vec<ForecastDay> {
    let mut groups: Vec<(NaiveDate, Vec<&ForecastSample>)> = Vec::new();

    for sample in samples {
        match groups.iter_mut().find(|(date, _)| *date == sample.date) {
            Some((_, group)) => group.push(sample),
            None => groups.push((sample.date, vec![sample])),
        }
    }

    groups
        .into_iter()
        .take(max_days)
        .map(|(date, group)| summarize_day(date, &group, wind_unit, source))
        .collect()
}

fn summarize_day(
    date: NaiveDate,
    group: &[&ForecastSample],
    wind_unit: WindUnit,
    source: ProviderId,
) -> ForecastDay {
    let min_temp = group.iter().map(|s| s.temp).fold(f64::INFINITY, f64::min);
    let max_temp = group.iter().map(|s| s.temp).fold(f64::NEG_INFINITY, f64::max);
    let precip = mean(group, |s| s.precip_probability);

    ForecastDay {
        date,
        weekday: date.format("%A").to_string(),
        min_temp,
        max_temp,
        humidity_pct: mean(group, |s| s.humidity_pct),
        wind_speed: mean(group, |s| s.wind_speed),
        wind_unit,
        pressure_hpa: mean(group, |s| s.pressure_hpa),
        description: most_frequent(group.iter().map(|s| s.description.as_str())),
        precip_probability: fraction_to_percent(precip),
        source,
    }
}

fn mean(group: &[&ForecastSample], field: impl Fn(&ForecastSample) -> f64) -> f64 {
    if group.is_empty() {
        return 0.0;
    }
    group.iter().map(|s| field(s)).sum::<f64>() / group.len() as f64
}

/// Most frequent value; ties go to the one seen first.
pub(crate) fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, n) in counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}

/// 0.0..=1.0 fraction to a rounded percentage, clamped to 0..=100.
pub fn fraction_to_percent(fraction: f64) -> u8 {
    percent(fraction * 100.0)
}

/// Round and clamp a percentage to 0..=100.
pub fn percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}

//! Plain-text rendering of display records.

use std::collections::BTreeMap;

use weather_core::{
    CityCandidate, ProviderId,
    format::{DisplayAlert, DisplayForecastDay, DisplayReading},
};

pub fn print_reading(r: &DisplayReading) {
    let place = if r.country.is_empty() {
        r.city.clone()
    } else {
        format!("{}, {}", r.city, r.country)
    };
    println!("{place}");
    println!(
        "  {} {}{}  (feels like {}{})  {}",
        r.icon.glyph(),
        r.temperature,
        r.temperature_unit,
        r.feels_like,
        r.temperature_unit,
        title_case(&r.description),
    );
    println!("  Humidity:       {}%", r.humidity);
    println!("  Pressure:       {} hPa", r.pressure);
    println!("  Wind:           {} {} from {}°", r.wind_speed, r.wind_unit, r.wind_direction);
    println!("  Visibility:     {} km", r.visibility_km);
    println!("  Sunrise/sunset: {} / {}", or_dash(&r.sunrise), or_dash(&r.sunset));
    println!("  Updated:        {} ({})", r.updated, r.source);
}

pub fn print_forecast(city: &str, days: &[DisplayForecastDay], temperature_unit: &str) {
    println!("{}-day forecast for {city}", days.len());
    for d in days {
        println!(
            "  {:<9} {}  {} {:>4}{u} / {:>4}{u}  {}",
            d.day_name,
            d.date,
            d.icon.glyph(),
            d.min_temp,
            d.max_temp,
            title_case(&d.description),
            u = temperature_unit,
        );
        println!(
            "             humidity {}%  wind {} {}  pressure {} hPa  precipitation {}%",
            d.humidity, d.wind_speed, d.wind_unit, d.pressure, d.precip_probability
        );
    }
}

pub fn print_alerts(city: &str, alerts: &[DisplayAlert]) {
    if alerts.is_empty() {
        println!("No active weather alerts for {city}.");
        return;
    }

    println!("{} alert(s) for {city}", alerts.len());
    for a in alerts {
        println!("  {} {} [{}] ({})", a.icon.glyph(), a.title, a.severity, a.source);
        println!("     {}", a.description);
        if !a.start_time.is_empty() || !a.end_time.is_empty() {
            println!("     from {} until {}", or_dash(&a.start_time), or_dash(&a.end_time));
        }
    }
}

pub fn print_cities(query: &str, cities: &[CityCandidate]) {
    if cities.is_empty() {
        println!("No cities found for '{query}'.");
        return;
    }

    for (i, city) in cities.iter().enumerate() {
        println!("  {}. {}  ({:.4}, {:.4})", i + 1, city.label(), city.lat, city.lon);
    }
}

pub fn print_status(status: &BTreeMap<ProviderId, bool>) {
    for (id, ok) in status {
        let mark = if *ok { "ok" } else { "unavailable" };
        let role = if id.is_primary() {
            "primary"
        } else {
            "secondary"
        };
        println!("  {:<16} {:<10} {mark}", id.display_name(), role);
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "--" } else { value }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

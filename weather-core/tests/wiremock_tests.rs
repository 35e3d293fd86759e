//! Aggregator behaviour against mocked Visual Crossing and OpenWeatherMap servers.

use std::time::Duration;

use serde_json::json;
use weather_core::{Aggregator, ClientConfig, ProviderId, UnitSystem, WeatherError, WindUnit};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, path_regex, query_param},
};

const DAY_START: i64 = 1717372800; // 2024-06-03T00:00:00Z

fn client_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::new("VC_KEY", "OW_KEY");
    config.visual_crossing.base_url = format!("{}/vc", server.uri());
    config.open_weather.base_url = format!("{}/data/2.5", server.uri());
    config.open_weather.geo_base_url = format!("{}/geo/1.0", server.uri());
    config.timeout = Duration::from_secs(5);
    config
}

fn aggregator(server: &MockServer) -> Aggregator {
    #[allow(clippy::expect_used)]
    Aggregator::new(&client_config(server)).expect("Failed to create aggregator")
}

async fn mount(server: &MockServer, mock: Mock) {
    mock.mount(server).await;
}

fn vc_current_body() -> serde_json::Value {
    json!({
        "resolvedAddress": "London, England, United Kingdom",
        "currentConditions": {
            "temp": 59.0,
            "feelslike": 57.2,
            "humidity": 72.0,
            "pressure": 29.92,
            "windspeed": 8.1,
            "winddir": 240.0,
            "visibility": 6.2,
            "conditions": "Partially cloudy",
            "icon": "partly-cloudy-day",
            "sunriseEpoch": 1717386500,
            "sunsetEpoch": 1717445500,
            "datetimeEpoch": 1717416000
        }
    })
}

fn ow_current_body(temp: f64) -> serde_json::Value {
    json!({
        "name": "London",
        "dt": 1717416000,
        "main": { "temp": temp, "feels_like": temp - 1.0, "humidity": 80, "pressure": 1008 },
        "weather": [{ "main": "Clouds", "description": "broken clouds", "icon": "04d" }],
        "wind": { "speed": 5.1, "deg": 250 },
        "visibility": 10000,
        "sys": { "country": "GB", "sunrise": 1717386500, "sunset": 1717445500 }
    })
}

fn ow_forecast_body() -> serde_json::Value {
    let first_day = [10.0, 12.0, 14.0, 16.0, 15.0, 13.0, 11.0, 9.0];
    let mut list: Vec<serde_json::Value> = first_day
        .iter()
        .enumerate()
        .map(|(i, temp)| {
            let dt = DAY_START + i as i64 * 10800;
            let description = if i < 5 {
                "light rain"
            } else {
                "overcast clouds"
            };
            json!({
                "dt": dt,
                "main": { "temp": temp, "humidity": 70, "pressure": 1010 },
                "weather": [{ "description": description }],
                "wind": { "speed": 4.0 },
                "pop": 0.5
            })
        })
        .collect();
    list.push(json!({
        "dt": DAY_START + 86400,
        "main": { "temp": 18.0, "humidity": 50, "pressure": 1015 },
        "weather": [{ "description": "clear sky" }],
        "wind": { "speed": 2.0 },
        "pop": 0.0
    }));

    json!({ "city": { "name": "London", "country": "GB", "timezone": 0 }, "list": list })
}

fn vc_days_body(count: usize) -> serde_json::Value {
    let days: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "datetime": format!("2024-06-{:02}", 3 + i),
                "tempmin": 8.0 + i as f64,
                "tempmax": 17.0 + i as f64,
                "humidity": 65.0,
                "windspeed": 14.4,
                "pressure": 1016.0,
                "conditions": "Rain, Partially cloudy",
                "precipprob": 35.0
            })
        })
        .collect();
    json!({ "resolvedAddress": "London, England, United Kingdom", "days": days })
}

fn geo_body() -> serde_json::Value {
    json!([
        { "name": "London", "country": "GB", "state": "England", "lat": 51.5074, "lon": -0.1278 },
        { "name": "London", "country": "CA", "state": "Ontario", "lat": 42.9834, "lon": -81.233 }
    ])
}

// ============================================================================
// Current conditions
// ============================================================================

#[tokio::test]
async fn primary_server_error_falls_back_to_secondary() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path_regex(r"^/vc/London/today$"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error")),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "OW_KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ow_current_body(15.0))),
    )
    .await;

    let reading = aggregator(&server)
        .current_conditions("London", UnitSystem::Metric)
        .await
        .expect("secondary should answer");

    assert_eq!(reading.temperature, 15.0);
    assert_eq!(reading.source, ProviderId::OpenWeather);
    assert_eq!(reading.pressure_hpa, 1008.0);
    assert_eq!(reading.visibility_km, 10.0);
    assert_eq!(reading.wind_unit, WindUnit::MetersPerSecond);
    assert_eq!(reading.country, "GB");
}

#[tokio::test]
async fn imperial_primary_reading_is_normalized() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/vc/London/today"))
            .and(query_param("unitGroup", "us"))
            .and(query_param("key", "VC_KEY"))
            .and(query_param("include", "current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vc_current_body())),
    )
    .await;

    let reading = aggregator(&server)
        .current_conditions("London", UnitSystem::Imperial)
        .await
        .expect("primary should answer");

    assert_eq!(reading.source, ProviderId::VisualCrossing);
    assert_eq!(reading.city, "London");
    assert_eq!(reading.country, "United Kingdom");
    assert_eq!(reading.temperature, 59.0);
    assert!((reading.pressure_hpa - 1013.21).abs() < 0.01, "got {}", reading.pressure_hpa);
    assert!((reading.visibility_km - 9.978).abs() < 0.01, "got {}", reading.visibility_km);
    assert_eq!(reading.wind_unit, WindUnit::MilesPerHour);
    assert_eq!(reading.icon, "02d");
    assert_eq!(reading.sunrise.map(|t| t.timestamp()), Some(1717386500));
}

#[tokio::test]
async fn empty_primary_payload_falls_back() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/vc/London/today"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "days": [] }))),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ow_current_body(21.0))),
    )
    .await;

    let reading = aggregator(&server)
        .current_conditions("London", UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(reading.source, ProviderId::OpenWeather);
    assert_eq!(reading.temperature, 21.0);
}

#[tokio::test]
async fn unknown_city_is_no_data() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path_regex(r"^/vc/"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Bad API Request:Invalid location"),
            ),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404",
                "message": "city not found"
            }))),
    )
    .await;

    let err = aggregator(&server)
        .current_conditions("Atlantis", UnitSystem::Metric)
        .await
        .unwrap_err();
    assert!(matches!(err, WeatherError::NoData { .. }), "got {err:?}");
}

#[tokio::test]
async fn malformed_primary_json_falls_back() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/vc/London/today"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>")),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ow_current_body(12.0))),
    )
    .await;

    let reading = aggregator(&server)
        .current_conditions("London", UnitSystem::Metric)
        .await
        .unwrap();
    assert_eq!(reading.source, ProviderId::OpenWeather);
}

// ============================================================================
// Forecast
// ============================================================================

#[tokio::test]
async fn primary_forecast_is_truncated_to_day_count() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path_regex(r"^/vc/London/today/\d{4}-\d{2}-\d{2}$"))
            .and(query_param("include", "days"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vc_days_body(12))),
    )
    .await;

    let days = aggregator(&server).forecast("London", 10, UnitSystem::Metric).await.unwrap();

    assert_eq!(days.len(), 10);
    assert!(days.iter().all(|d| d.min_temp <= d.max_temp));
    assert!(days.iter().all(|d| d.source == ProviderId::VisualCrossing));
    assert_eq!(days[0].weekday, "Monday");
    assert_eq!(days[0].precip_probability, 35);
    assert_eq!(days[0].pressure_hpa, 1016.0);
    assert_eq!(days[0].wind_unit, WindUnit::KilometersPerHour);
}

#[tokio::test]
async fn secondary_forecast_is_grouped_by_date() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path_regex(r"^/vc/"))
            .respond_with(ResponseTemplate::new(503)),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ow_forecast_body())),
    )
    .await;

    let days = aggregator(&server).forecast("London", 10, UnitSystem::Metric).await.unwrap();

    assert_eq!(days.len(), 2);
    let first = &days[0];
    assert_eq!(first.min_temp, 9.0);
    assert_eq!(first.max_temp, 16.0);
    assert_eq!(first.description, "light rain");
    assert_eq!(first.precip_probability, 50);
    assert_eq!(first.humidity_pct, 70.0);
    assert_eq!(first.source, ProviderId::OpenWeather);
    assert_eq!(days[1].max_temp, 18.0);
    assert_eq!(days[1].precip_probability, 0);
}

#[tokio::test]
async fn secondary_forecast_respects_small_day_count() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path_regex(r"^/vc/"))
            .respond_with(ResponseTemplate::new(500)),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ow_forecast_body())),
    )
    .await;

    let days = aggregator(&server).forecast("London", 1, UnitSystem::Metric).await.unwrap();
    assert_eq!(days.len(), 1);
}

// ============================================================================
// Alerts
// ============================================================================

#[tokio::test]
async fn alerts_combine_native_and_synthesized() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "London"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(geo_body())),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/vc/London/today"))
            .and(query_param("include", "alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [{
                    "event": "Flood Warning",
                    "description": "River levels rising",
                    "onset": "2024-06-03T06:00:00",
                    "ends": "2024-06-04T06:00:00"
                }]
            }))),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "51.5074"))
            .and(query_param("lon", "-0.1278"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "weather": [{ "main": "Thunderstorm", "description": "thunderstorm with rain" }],
                "wind": { "speed": 19.0 }
            }))),
    )
    .await;

    let alerts = aggregator(&server).alerts("London").await.unwrap();

    assert_eq!(alerts.len(), 3);
    assert_eq!(alerts[0].event, "Flood Warning");
    assert_eq!(alerts[0].severity, "Unknown");
    assert_eq!(alerts[0].end.as_deref(), Some("2024-06-04T06:00:00"));
    assert_eq!(alerts[0].source, ProviderId::VisualCrossing);
    assert_eq!(alerts[1].event, "Severe Thunderstorm Warning");
    assert_eq!(alerts[1].severity, "Severe");
    assert_eq!(alerts[2].event, "High Wind Warning");
    assert_eq!(alerts[2].severity, "Moderate");
}

#[tokio::test]
async fn alerts_with_all_providers_erroring_are_empty() {
    let server = MockServer::start().await;

    mount(&server, Mock::given(method("GET")).respond_with(ResponseTemplate::new(500))).await;

    let alerts = aggregator(&server).alerts("London").await.expect("alerts never fail fatally");
    assert!(alerts.is_empty());
}

#[tokio::test]
async fn geocoding_failure_still_returns_primary_alerts() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(401)),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/vc/London/today"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alerts": [{ "event": "Heat Advisory", "severity": "Minor" }]
            }))),
    )
    .await;

    let alerts = aggregator(&server).alerts("London").await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].description, "Weather alert in effect");
    assert_eq!(alerts[0].severity, "Minor");
}

// ============================================================================
// Geocoding and status
// ============================================================================

#[tokio::test]
async fn search_cities_maps_candidates() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(geo_body())),
    )
    .await;

    let cities = aggregator(&server).search_cities("London", 5).await.unwrap();
    assert_eq!(cities.len(), 2);
    assert_eq!(cities[1].label(), "London, Ontario, CA");
    assert_eq!(cities[0].lat, 51.5074);
}

#[tokio::test]
async fn search_cities_is_empty_on_failure() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests")),
    )
    .await;

    let cities = aggregator(&server).search_cities("London", 5).await.unwrap();
    assert!(cities.is_empty());
}

#[tokio::test]
async fn resolve_coordinates_takes_first_match() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(geo_body())),
    )
    .await;

    let coords = aggregator(&server).resolve_coordinates("London").await.unwrap();
    assert_eq!(coords.lat, 51.5074);
    assert_eq!(coords.lon, -0.1278);
}

#[tokio::test]
async fn validate_providers_reports_each_provider() {
    let server = MockServer::start().await;

    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/vc/London/today"))
            .and(query_param("unitGroup", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vc_current_body())),
    )
    .await;
    mount(
        &server,
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"cod": 401}))),
    )
    .await;

    let status = aggregator(&server).validate_providers().await;
    assert_eq!(status.get(&ProviderId::VisualCrossing), Some(&true));
    assert_eq!(status.get(&ProviderId::OpenWeather), Some(&false));
}

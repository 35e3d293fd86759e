//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The two weather providers and the primary/secondary [`Aggregator`]
//! - Provider-agnostic domain models and their display formatting
//! - Per-action task dispatch and JSON snapshots
//!
//! It is used by `weather-cli`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod forecast;
pub mod format;
pub mod model;
pub mod provider;

pub use aggregator::{Aggregator, DEFAULT_SEARCH_LIMIT};
pub use config::{AlertRules, ClientConfig, Config, ProviderConfig};
pub use dispatch::{ActionKind, Dispatcher, Update};
pub use error::{ProviderError, WeatherError};
pub use export::Snapshot;
pub use format::Formatter;
pub use model::{
    AlertRecord, CityCandidate, Coordinates, ForecastDay, UnitSystem, WeatherReading, WindUnit,
};
pub use provider::{Geocoder, Outcome, ProviderId, WeatherProvider};

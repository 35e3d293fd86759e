use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use weather_core::{
    Aggregator, Config, DEFAULT_SEARCH_LIMIT, Formatter, ProviderId, Snapshot, UnitSystem,
};

use crate::{interactive, output};

pub(crate) const DEFAULT_FORECAST_DAYS: usize = 10;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "visualcrossing" or "openweather".
        provider: String,
    },

    /// Show current conditions for a city.
    Current {
        city: String,

        /// "metric" or "imperial"; defaults to the configured unit system.
        #[arg(long)]
        units: Option<UnitSystem>,
    },

    /// Show a daily forecast for a city.
    Forecast {
        city: String,

        #[arg(long, default_value_t = DEFAULT_FORECAST_DAYS)]
        days: usize,

        #[arg(long)]
        units: Option<UnitSystem>,
    },

    /// Show active weather alerts for a city.
    Alerts { city: String },

    /// Search for cities by name.
    Search {
        query: String,

        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// Check that both providers answer.
    Status,

    /// Fetch everything for a city and save it as a JSON snapshot.
    Export {
        city: String,

        /// Directory the snapshot is written to.
        #[arg(long, default_value = "data")]
        dir: PathBuf,

        #[arg(long)]
        units: Option<UnitSystem>,
    },

    /// Prompt loop; several requests may be in flight at once.
    Interactive {
        #[arg(long)]
        units: Option<UnitSystem>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider)?,
            Command::Current { city, units } => {
                let (config, aggregator) = connect()?;
                let units = units.unwrap_or(config.default_units);
                let reading = aggregator.current_conditions(&city, units).await?;
                output::print_reading(&Formatter::local().reading(&reading));
            }
            Command::Forecast { city, days, units } => {
                let (config, aggregator) = connect()?;
                let units = units.unwrap_or(config.default_units);
                let forecast = aggregator.forecast(&city, days, units).await?;
                let days = Formatter::local().forecast(&forecast);
                output::print_forecast(&city, &days, units.temperature_label());
            }
            Command::Alerts { city } => {
                let (_, aggregator) = connect()?;
                let alerts = aggregator.alerts(&city).await?;
                output::print_alerts(&city, &Formatter::local().alerts(&alerts));
            }
            Command::Search { query, limit } => {
                let (_, aggregator) = connect()?;
                let cities = aggregator.search_cities(&query, limit).await?;
                output::print_cities(&query, &cities);
            }
            Command::Status => {
                let (_, aggregator) = connect()?;
                output::print_status(&aggregator.validate_providers().await);
            }
            Command::Export { city, dir, units } => {
                let (config, aggregator) = connect()?;
                let units = units.unwrap_or(config.default_units);
                let path = export(&aggregator, &city, units, &dir).await?;
                println!("Weather data saved to {}", path.display());
            }
            Command::Interactive { units } => {
                let (config, aggregator) = connect()?;
                let units = units.unwrap_or(config.default_units);
                interactive::run(aggregator, units).await?;
            }
        }

        Ok(())
    }
}

fn connect() -> anyhow::Result<(Config, Aggregator)> {
    let config = Config::load()?;
    let aggregator = Aggregator::new(&config.client_config()?)?;
    Ok((config, aggregator))
}

/// Fetch all three views concurrently; a view that fails is saved empty.
async fn export(
    aggregator: &Aggregator,
    city: &str,
    units: UnitSystem,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let (current, forecast, alerts) = tokio::join!(
        aggregator.current_conditions(city, units),
        aggregator.forecast(city, DEFAULT_FORECAST_DAYS, units),
        aggregator.alerts(city),
    );

    if let Err(e) = &current {
        warn!(error = %e, "exporting without current conditions");
    }

    let snapshot = Snapshot::new(
        city,
        units,
        current.ok(),
        forecast.unwrap_or_default(),
        alerts.unwrap_or_default(),
    )?;
    Ok(snapshot.write_to(dir)?)
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = inquire::Password::new(&format!("{} API key:", id.display_name()))
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    config.save()?;

    info!(provider = %id, "provider configured");
    println!(
        "Saved {} key to {}",
        id.display_name(),
        Config::config_file_path()?.display()
    );

    for other in ProviderId::all().iter().filter(|p| !config.is_provider_configured(**p)) {
        println!("Hint: `weather configure {other}` is still needed.");
    }

    Ok(())
}

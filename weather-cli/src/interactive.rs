//! Line-oriented prompt over the dispatcher.
//!
//! Each command starts a background fetch; the prompt stays responsive and
//! results are printed as they arrive. Repeating a command before its result
//! is in replaces the earlier request.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use weather_core::{
    ActionKind, Aggregator, AlertRecord, CityCandidate, DEFAULT_SEARCH_LIMIT, Dispatcher,
    ForecastDay, Formatter, ProviderId, Snapshot, UnitSystem, Update, WeatherError,
    WeatherReading,
};

use crate::{cli::DEFAULT_FORECAST_DAYS, output};

const HELP: &str = "\
Commands:
  current <city>        current conditions
  forecast <city>       daily forecast
  alerts <city>         active weather alerts
  search <query>        find cities by name
  pick <n>              load everything for result n of the last search
  units <metric|imperial>
  status                check both providers
  save [dir]            write the latest results to a JSON snapshot
  help
  quit";

#[derive(Debug, PartialEq)]
enum Input {
    Current(String),
    Forecast(String),
    Alerts(String),
    Search(String),
    Pick(usize),
    Units(UnitSystem),
    Status,
    Save(Option<PathBuf>),
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let argument = |what: &str| {
        if rest.is_empty() {
            Err(format!("usage: {word} <{what}>"))
        } else {
            Ok(rest.to_string())
        }
    };

    let input = match word.to_lowercase().as_str() {
        "current" | "now" => Input::Current(argument("city")?),
        "forecast" => Input::Forecast(argument("city")?),
        "alerts" => Input::Alerts(argument("city")?),
        "search" => Input::Search(argument("query")?),
        "pick" => {
            let n = argument("n")?;
            Input::Pick(n.parse().map_err(|_| format!("'{n}' is not a result number"))?)
        }
        "units" => {
            let units = argument("metric|imperial")?;
            Input::Units(units.parse::<UnitSystem>().map_err(|e| e.to_string())?)
        }
        "status" => Input::Status,
        "save" => Input::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command '{other}', type 'help'")),
    };

    Ok(Some(input))
}

/// City query for a search result: "Name,CC" when the country is known.
fn candidate_query(candidate: &CityCandidate) -> String {
    if candidate.country.is_empty() {
        candidate.name.clone()
    } else {
        format!("{},{}", candidate.name, candidate.country)
    }
}

#[derive(Debug)]
enum Payload {
    Current {
        city: String,
        result: Result<WeatherReading, WeatherError>,
    },
    Forecast {
        city: String,
        units: UnitSystem,
        result: Result<Vec<ForecastDay>, WeatherError>,
    },
    Alerts {
        city: String,
        result: Result<Vec<AlertRecord>, WeatherError>,
    },
    Search {
        query: String,
        result: Result<Vec<CityCandidate>, WeatherError>,
    },
    Status(BTreeMap<ProviderId, bool>),
}

/// Results received for the most recently shown city.
#[derive(Debug, Default)]
struct Latest {
    city: String,
    current: Option<WeatherReading>,
    forecast: Vec<ForecastDay>,
    alerts: Vec<AlertRecord>,
}

impl Latest {
    fn for_city(&mut self, city: &str) -> &mut Self {
        if self.city != city {
            *self = Self {
                city: city.to_string(),
                ..Self::default()
            };
        }
        self
    }
}

struct Session {
    aggregator: Arc<Aggregator>,
    dispatcher: Dispatcher<Payload>,
    formatter: Formatter<Local>,
    units: UnitSystem,
    latest: Latest,
    /// Results of the last successful search, numbered from 1 when printed.
    search_results: Vec<CityCandidate>,
}

impl Session {
    fn new(aggregator: Aggregator, units: UnitSystem) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            dispatcher: Dispatcher::new(),
            formatter: Formatter::local(),
            units,
            latest: Latest::default(),
            search_results: Vec::new(),
        }
    }

    /// Start the work for `input` and return at once. `false` means quit.
    fn handle(&mut self, input: Input) -> bool {
        match input {
            Input::Current(city) => self.launch_current(city),
            Input::Forecast(city) => self.launch_forecast(city),
            Input::Alerts(city) => self.launch_alerts(city),
            Input::Search(query) => {
                let aggregator = Arc::clone(&self.aggregator);
                self.dispatcher.launch(ActionKind::Search, async move {
                    let result = aggregator.search_cities(&query, DEFAULT_SEARCH_LIMIT).await;
                    Payload::Search { query, result }
                });
            }
            Input::Pick(n) => match self.pick(n) {
                Ok(city) => {
                    println!("Loading weather for {city}...");
                    self.launch_current(city.clone());
                    self.launch_forecast(city.clone());
                    self.launch_alerts(city);
                }
                Err(message) => println!("{message}"),
            },
            Input::Units(units) => {
                self.units = units;
                println!("Units set to {units}.");
            }
            Input::Status => {
                let aggregator = Arc::clone(&self.aggregator);
                self.dispatcher.launch(ActionKind::Status, async move {
                    Payload::Status(aggregator.validate_providers().await)
                });
            }
            Input::Save(dir) => {
                let dir = dir.unwrap_or_else(|| PathBuf::from("data"));
                match self.save(&dir) {
                    Ok(path) => println!("Weather data saved to {}", path.display()),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => return false,
        }

        true
    }

    fn launch_current(&mut self, city: String) {
        let aggregator = Arc::clone(&self.aggregator);
        let units = self.units;
        self.dispatcher.launch(ActionKind::Current, async move {
            let result = aggregator.current_conditions(&city, units).await;
            Payload::Current { city, result }
        });
    }

    fn launch_forecast(&mut self, city: String) {
        let aggregator = Arc::clone(&self.aggregator);
        let units = self.units;
        self.dispatcher.launch(ActionKind::Forecast, async move {
            let result = aggregator.forecast(&city, DEFAULT_FORECAST_DAYS, units).await;
            Payload::Forecast {
                city,
                units,
                result,
            }
        });
    }

    fn launch_alerts(&mut self, city: String) {
        let aggregator = Arc::clone(&self.aggregator);
        self.dispatcher.launch(ActionKind::Alerts, async move {
            let result = aggregator.alerts(&city).await;
            Payload::Alerts { city, result }
        });
    }

    /// City query for the `n`th (1-based) result of the last search.
    fn pick(&self, n: usize) -> Result<String, String> {
        if self.search_results.is_empty() {
            return Err("no search results yet, run 'search <query>' first".to_string());
        }

        n.checked_sub(1)
            .and_then(|i| self.search_results.get(i))
            .map(candidate_query)
            .ok_or_else(|| format!("pick a number from 1 to {}", self.search_results.len()))
    }

    fn show(&mut self, update: Update<Payload>) {
        debug!(kind = ?update.kind, generation = update.generation, "result received");

        match update.payload {
            Payload::Current { city, result } => match result {
                Ok(reading) => {
                    output::print_reading(&self.formatter.reading(&reading));
                    self.latest.for_city(&city).current = Some(reading);
                }
                Err(e) => println!("Error: {e}"),
            },
            Payload::Forecast {
                city,
                units,
                result,
            } => match result {
                Ok(days) => {
                    let label = units.temperature_label();
                    output::print_forecast(&city, &self.formatter.forecast(&days), label);
                    self.latest.for_city(&city).forecast = days;
                }
                Err(e) => println!("Error: {e}"),
            },
            Payload::Alerts { city, result } => match result {
                Ok(alerts) => {
                    output::print_alerts(&city, &self.formatter.alerts(&alerts));
                    self.latest.for_city(&city).alerts = alerts;
                }
                Err(e) => println!("Error: {e}"),
            },
            Payload::Search { query, result } => match result {
                Ok(cities) => {
                    output::print_cities(&query, &cities);
                    if !cities.is_empty() {
                        println!("Type 'pick <n>' to load one.");
                    }
                    self.search_results = cities;
                }
                Err(e) => println!("Error: {e}"),
            },
            Payload::Status(status) => output::print_status(&status),
        }
    }

    fn save(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let latest = &self.latest;
        if latest.city.is_empty() {
            anyhow::bail!("nothing to save yet, fetch some weather first");
        }

        let units = latest.current.as_ref().map_or(self.units, |r| r.units);
        let snapshot = Snapshot::new(
            &latest.city,
            units,
            latest.current.clone(),
            latest.forecast.clone(),
            latest.alerts.clone(),
        )?;
        Ok(snapshot.write_to(dir)?)
    }
}

fn prompt() -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "weather> ")?;
    stdout.flush().context("Failed to flush stdout")
}

pub async fn run(aggregator: Aggregator, units: UnitSystem) -> anyhow::Result<()> {
    let mut session = Session::new(aggregator, units);

    println!("Type 'help' for commands.");
    prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else { break };
                match parse_input(&line) {
                    Ok(Some(input)) => {
                        if !session.handle(input) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                }
                prompt()?;
            }
            Some(update) = session.dispatcher.next_update() => {
                println!();
                session.show(update);
                prompt()?;
            }
        }
    }

    session.dispatcher.cancel_all();
    Ok(())
}

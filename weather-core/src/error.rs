use thiserror::Error;

use crate::provider::ProviderId;

/// Errors visible to callers of the aggregator.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Empty or otherwise unusable input, rejected before any request is made.
    #[error("Invalid input: {0}")]
    MalformedInput(String),

    /// No provider produced usable data.
    #[error("No {what} data found for '{query}'")]
    NoData { what: &'static str, query: String },

    #[error(
        "No API key configured for provider '{0}'.\n\
         Hint: run `weather configure {0}` and enter your API key."
    )]
    MissingApiKey(ProviderId),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Export failed: {0}")]
    Export(String),
}

impl WeatherError {
    pub(crate) fn no_data(what: &'static str, query: &str) -> Self {
        WeatherError::NoData {
            what,
            query: query.to_string(),
        }
    }
}

/// A single provider call that produced no answer.
///
/// Absorbed by the aggregator: it triggers the fallback or contributes an
/// empty partial result, and is only ever logged.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid request url: {0}")]
    Url(String),
}

/// Reject blank city names and queries.
pub(crate) fn require_non_blank<'a>(value: &'a str, field: &str) -> Result<&'a str, WeatherError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WeatherError::MalformedInput(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

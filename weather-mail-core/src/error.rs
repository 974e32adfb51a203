//! Typed failures callers branch on. Everything else travels as `anyhow::Error`.

use thiserror::Error;

/// Missing or invalid configuration. Always fatal, raised before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "No OpenWeather API key configured.\n\
         Hint: set OPENWEATHER_API_KEY or run `weather-mail configure`."
    )]
    MissingWeatherKey,

    #[error(
        "No SendGrid API key configured.\n\
         Hint: set SENDGRID_API_KEY or run `weather-mail configure`."
    )]
    MissingEmailKey,

    #[error("No recipients configured. Hint: set RECIPIENT_EMAIL to a comma-separated list.")]
    NoRecipients,

    #[error("The location list is empty")]
    NoLocations,
}

/// History file could not be written.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not replace history file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// A forecast range string that does not have the "low°-high°" shape.
#[derive(Debug, Error, PartialEq)]
pub enum TrendError {
    #[error("no forecast available to derive an outlook")]
    NoForecast,

    #[error("malformed temperature range '{0}'")]
    MalformedRange(String),
}

/// Run-level failures that mean there is nothing useful to deliver.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("No weather data could be fetched for any of the {0} locations")]
    NoWeatherData(usize),

    #[error("Email delivery failed for all {0} recipients")]
    NothingSent(usize),
}

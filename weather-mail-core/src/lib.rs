//! Core library for the `weather-mail` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather provider abstraction and its OpenWeather client
//! - Scoring, trends and wording for each location
//! - Rolling JSON history of past runs
//! - The HTML template engine, charts and SendGrid delivery
//!
//! [`pipeline::run`] ties these together into one daily job.

pub mod analytics;
pub mod chart;
pub mod config;
pub mod error;
pub mod forecast;
pub mod history;
pub mod mailer;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod render;
pub mod report;

pub use config::{Config, Settings};
pub use error::{ConfigError, HistoryError, PipelineError, TrendError};
pub use history::HistoryStore;
pub use mailer::{DeliveryReport, Mailer, SendGridMailer};
pub use model::{Location, WeatherSnapshot};
pub use pipeline::{Report, RunSummary};
pub use provider::WeatherProvider;

use crate::{
    config::Settings,
    model::{ForecastEntry, Location, Observation},
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Source of current conditions and short-range forecasts.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, location: &Location) -> anyhow::Result<Observation>;

    /// 3-hourly forecast points, in any order.
    async fn forecast(&self, location: &Location) -> anyhow::Result<Vec<ForecastEntry>>;
}

/// Construct the provider configured for this run.
pub fn provider_from_settings(settings: &Settings) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let provider = OpenWeatherProvider::new(settings.openweather_api_key.clone())?;
    Ok(Box::new(provider))
}

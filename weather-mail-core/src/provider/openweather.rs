use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::model::{ForecastEntry, Location, Observation};

use super::WeatherProvider;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another host, e.g. a mock server.
    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http })
    }

    async fn get_json<T>(&self, endpoint: &str, location: &Location) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/data/2.5/{endpoint}", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", location.lat.to_string()),
                ("lon", location.lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({endpoint})"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read OpenWeather {endpoint} response body"))?;

        if !status.is_success() {
            return Err(anyhow!(
                "OpenWeather {} request failed with status {}: {}",
                endpoint,
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse OpenWeather {endpoint} JSON"))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    #[serde(default)]
    timezone: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    #[serde(default)]
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    #[serde(default)]
    timezone: i64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, location: &Location) -> Result<Observation> {
        let parsed: OwCurrentResponse = self.get_json("weather", location).await?;

        let condition = parsed
            .weather
            .first()
            .ok_or_else(|| anyhow!("OpenWeather response for {} had no condition", location.name))?;

        let local_time = unix_to_local(parsed.dt, parsed.timezone)
            .unwrap_or_else(|| Utc::now().naive_utc());

        Ok(Observation {
            temperature_c: parsed.main.temp,
            feels_like_c: parsed.main.feels_like.unwrap_or(parsed.main.temp),
            humidity_pct: parsed.main.humidity,
            wind_speed_mps: parsed.wind.speed,
            condition: condition.main.clone(),
            description: condition.description.clone(),
            local_time,
        })
    }

    async fn forecast(&self, location: &Location) -> Result<Vec<ForecastEntry>> {
        let parsed: OwForecastResponse = self.get_json("forecast", location).await?;
        let offset = parsed.city.timezone;

        let entries: Vec<ForecastEntry> = parsed
            .list
            .into_iter()
            .filter_map(|entry| {
                Some(ForecastEntry {
                    local_time: unix_to_local(entry.dt, offset)?,
                    temperature_c: entry.main.temp,
                    condition: entry
                        .weather
                        .into_iter()
                        .next()
                        .map(|w| w.main)
                        .unwrap_or_else(|| "Unknown".to_string()),
                })
            })
            .collect();

        debug!(city = %location.name, entries = entries.len(), "forecast fetched");
        Ok(entries)
    }
}

/// Unix seconds plus the location's UTC offset, as wall-clock time.
fn unix_to_local(ts: i64, offset_secs: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(ts.checked_add(offset_secs)?, 0).map(|dt| dt.naive_utc())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn houston() -> Location {
        Location::new("Houston, TX", 29.76, -95.36)
    }

    #[test]
    fn unix_to_local_applies_offset() {
        // 2026-02-07T18:00:00Z in UTC-6
        let local = unix_to_local(1_770_487_200, -6 * 3600).expect("valid");
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2026, 2, 7).expect("date"));
        assert_eq!(local.hour(), 12);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "°".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn current_parses_observation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "29.76"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dt": 1_770_487_200,
                "timezone": -21600,
                "name": "Houston",
                "main": { "temp": 31.6, "feels_like": 35.2, "humidity": 72 },
                "weather": [{ "main": "Clouds", "description": "broken clouds" }],
                "wind": { "speed": 4.1 }
            })))
            .mount(&server)
            .await;

        let provider =
            OpenWeatherProvider::with_base_url("KEY".into(), &server.uri()).expect("client");
        let obs = provider.current(&houston()).await.expect("observation");

        assert_eq!(obs.temperature_c, 31.6);
        assert_eq!(obs.feels_like_c, 35.2);
        assert_eq!(obs.humidity_pct, 72);
        assert_eq!(obs.wind_speed_mps, 4.1);
        assert_eq!(obs.condition, "Clouds");
        assert_eq!(obs.description, "broken clouds");
        assert_eq!(obs.local_time.hour(), 12);
    }

    #[tokio::test]
    async fn current_reports_http_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("{\"message\":\"Invalid API key\"}"),
            )
            .mount(&server)
            .await;

        let provider =
            OpenWeatherProvider::with_base_url("BAD".into(), &server.uri()).expect("client");
        let err = provider.current(&houston()).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn forecast_converts_entries_to_local_time() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "city": { "name": "Houston", "timezone": -21600 },
                "list": [
                    { "dt": 1_770_487_200, "main": { "temp": 24.0 }, "weather": [{ "main": "Clear" }] },
                    { "dt": 1_770_498_000, "main": { "temp": 22.5 }, "weather": [] }
                ]
            })))
            .mount(&server)
            .await;

        let provider =
            OpenWeatherProvider::with_base_url("KEY".into(), &server.uri()).expect("client");
        let entries = provider.forecast(&houston()).await.expect("forecast");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].local_time.hour(), 12);
        assert_eq!(entries[0].condition, "Clear");
        assert_eq!(entries[1].local_time.hour(), 15);
        assert_eq!(entries[1].condition, "Unknown");
    }
}

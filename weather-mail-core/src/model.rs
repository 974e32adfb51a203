use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A monitored place, queried by coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Display name in "City, Region" form.
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self { name: name.into(), lat, lon }
    }
}

/// The three cities the daily mail covers unless configured otherwise.
pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("Houston, TX", 29.76, -95.36),
        Location::new("Hyderabad, Telangana", 17.38, 78.48),
        Location::new("Srikalahasthi, AP", 13.75, 79.70),
    ]
}

/// Current conditions as reported by a provider, before any analytics.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    /// Categorical condition tag, e.g. "Clear" or "Rain".
    pub condition: String,
    pub description: String,
    /// Observation time in the location's own clock.
    pub local_time: NaiveDateTime,
}

/// One raw 3-hourly forecast point.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    /// Forecast time in the location's own clock.
    pub local_time: NaiveDateTime,
    pub temperature_c: f64,
    pub condition: String,
}

/// Summary of one future day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Short weekday label, e.g. "Mon".
    pub day: String,
    /// "low°-high°", whole degrees.
    pub temp_range: String,
    pub emoji: String,
}

/// One location's processed weather state for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub name: String,
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub weather_main: String,
    pub description: String,
    pub comfort_score: u8,
    pub emoji: String,
    pub personality: String,
    pub insight: String,
    #[serde(default)]
    pub forecast: Vec<ForecastDay>,
    #[serde(default)]
    pub temp_diff: f64,
    #[serde(default)]
    pub diff_str: String,
}

impl WeatherSnapshot {
    /// Stand-in for a location whose data could not be fetched.
    pub fn unavailable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            temp: 0.0,
            feels_like: 0.0,
            humidity: 0,
            wind_speed: 0.0,
            weather_main: "Unknown".to_string(),
            description: "Data unavailable".to_string(),
            comfort_score: 0,
            emoji: "❓".to_string(),
            personality: "Unknown".to_string(),
            insight: "Weather data temporarily unavailable".to_string(),
            forecast: Vec::new(),
            temp_diff: 0.0,
            diff_str: String::new(),
        }
    }

    /// The part of the name before its first comma.
    pub fn city(&self) -> &str {
        city_of(&self.name)
    }
}

pub(crate) fn city_of(name: &str) -> &str {
    name.split(',').next().unwrap_or(name)
}

/// Round to one decimal place, the precision every temperature is reported at.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_is_text_before_first_comma() {
        let snap = WeatherSnapshot::unavailable("Hyderabad, Telangana, IN");
        assert_eq!(snap.city(), "Hyderabad");
        assert_eq!(city_of("Nowhere"), "Nowhere");
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(31.96), 32.0);
        assert_eq!(round1(-3.24), -3.2);
    }

    #[test]
    fn snapshot_tolerates_missing_trend_fields() {
        let json = r#"{
            "name": "Houston, TX", "temp": 30.1, "feels_like": 33.0, "humidity": 70,
            "wind_speed": 3.0, "weather_main": "Clear", "description": "clear sky",
            "comfort_score": 6, "emoji": "☀️", "personality": "Hot Houston",
            "insight": "Typical weather for the region"
        }"#;
        let snap: WeatherSnapshot = serde_json::from_str(json).expect("valid snapshot");
        assert!(snap.forecast.is_empty());
        assert_eq!(snap.temp_diff, 0.0);
    }
}

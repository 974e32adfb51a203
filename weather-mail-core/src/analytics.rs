//! Pure scoring and wording functions that turn raw weather values into the
//! report's human-readable pieces.
//!
//! Nothing here touches the network or the filesystem; the pipeline feeds in
//! observations and history lookups and gets strings and scores back.

use chrono::NaiveDate;
use tracing::warn;

use crate::{
    error::TrendError,
    history::PreviousDay,
    model::{Observation, WeatherSnapshot, city_of, round1},
};

/// Trend text used when neither history nor a usable forecast exists.
pub const NO_TREND: &str = "New data, no trend yet";

const TYPICAL_WEATHER: &str = "Typical weather for the region";

/// Composite 0..=10 pleasantness rating.
///
/// Each sub-score is kept fractional; only the mean is rounded.
pub fn comfort_score(temp: f64, humidity: u8, wind_speed: f64) -> u8 {
    let temp_score = if (20.0..=26.0).contains(&temp) {
        10.0
    } else if (15.0..=30.0).contains(&temp) {
        7.0
    } else {
        f64::max(0.0, 10.0 - (temp - 23.0).abs() / 2.0)
    };

    let humidity = f64::from(humidity);
    let humidity_score = if (40.0..=60.0).contains(&humidity) {
        10.0
    } else {
        f64::max(0.0, 10.0 - (humidity - 50.0).abs() / 5.0)
    };

    let wind_kmh = wind_speed * 3.6;
    let wind_score = if wind_kmh <= 15.0 { 10.0 } else { f64::max(0.0, 10.0 - wind_kmh / 3.0) };

    let mean = (temp_score + humidity_score + wind_score) / 3.0;
    // f64::max already discards NaN sub-scores, the clamp covers the rest
    mean.round().clamp(0.0, 10.0) as u8
}

/// Emoji for a condition tag, with a heat or cold marker prepended.
pub fn condition_emoji(condition: &str, temp: f64) -> String {
    let base = match condition {
        "Clear" => "☀️",
        "Clouds" => "🌤️",
        "Rain" => "🌧️",
        "Drizzle" => "🌦️",
        "Thunderstorm" => "⛈️",
        "Snow" => "❄️",
        "Mist" | "Haze" => "🌫️",
        _ => "🌡️",
    };

    if temp > 35.0 {
        format!("🔥{base}")
    } else if temp < 10.0 {
        format!("🥶{base}")
    } else {
        base.to_string()
    }
}

/// Mood label such as "Humid Houston".
pub fn personality(name: &str, temp: f64, humidity: u8) -> String {
    let mood = if humidity > 70 {
        "Humid"
    } else if temp > 30.0 {
        "Hot"
    } else if (20.0..=28.0).contains(&temp) {
        "Pleasant"
    } else if temp < 15.0 {
        "Cool"
    } else {
        "Breezy"
    };

    format!("{mood} {}", city_of(name))
}

/// A location-specific suggestion, matched by substring on the location name.
struct LocalTip {
    place: &'static str,
    applies: fn(&Observation) -> bool,
    tip: &'static str,
}

const LOCAL_TIPS: &[LocalTip] = &[
    LocalTip {
        place: "Srikalahasthi",
        applies: |obs| obs.temperature_c < 28.0,
        tip: "Ideal temple visit weather",
    },
    LocalTip {
        place: "Hyderabad",
        applies: |obs| !is_wet(&obs.condition),
        tip: "Good evening for Irani chai and Osmania biscuits",
    },
    LocalTip {
        place: "Houston",
        applies: |obs| obs.temperature_c > 32.0,
        tip: "Plan errands before noon and stay in the shade",
    },
];

fn is_wet(condition: &str) -> bool {
    matches!(condition, "Rain" | "Drizzle" | "Thunderstorm")
}

/// Short narrative for one location, phrases joined with " • ".
///
/// The "perfect"/"pleasant" choice depends on whether a rain or humidity phrase
/// came first, so mild weather is never called perfect next to a warning.
pub fn insight(observation: &Observation, name: &str) -> String {
    let temp = observation.temperature_c;
    let humidity = observation.humidity_pct;
    let mut phrases: Vec<&str> = Vec::new();

    if is_wet(&observation.condition) {
        phrases.push("Rain expected - carry umbrella");
    }

    if humidity >= 75 {
        phrases.push("High humidity - feels muggy");
    } else if humidity <= 30 {
        phrases.push("Low humidity - stay hydrated");
    }

    if temp > 35.0 {
        phrases.push("Very hot - limit sun exposure");
    } else if temp < 15.0 {
        phrases.push("Cool weather - dress warmly");
    } else if (20.0..=26.0).contains(&temp) {
        if phrases.is_empty() {
            phrases.push("Perfect weather for outdoor activities");
        } else {
            phrases.push("Otherwise pleasant temperatures");
        }
    }

    if let Some(tip) =
        LOCAL_TIPS.iter().find(|t| name.contains(t.place) && (t.applies)(observation))
    {
        phrases.push(tip.tip);
    }

    if phrases.is_empty() { TYPICAL_WEATHER.to_string() } else { phrases.join(" • ") }
}

/// Stylized description of a temperature change in °C.
pub fn pizzazz(diff: f64) -> String {
    let signed = format!("{diff:+.1}°C");

    if diff == 0.0 {
        "➖ Holding steady (+0.0°C)".to_string()
    } else if diff > 2.0 {
        format!("🔥 Heating up! {signed}")
    } else if diff > 0.0 {
        format!("📈 A touch warmer ({signed})")
    } else if diff >= -2.0 {
        format!("📉 A touch cooler ({signed})")
    } else {
        format!("🥶 Cooling off! {signed}")
    }
}

/// Pull the high out of a "low°-high°" range. Handles negative values.
pub fn parse_high(temp_range: &str) -> Result<f64, TrendError> {
    let malformed = || TrendError::MalformedRange(temp_range.to_string());

    let (_, high) = temp_range.split_once("°-").ok_or_else(malformed)?;
    high.trim().trim_end_matches('°').trim().parse::<f64>().map_err(|_| malformed())
}

/// Trend from the first forecast day's high, for cities without history.
fn forecast_outlook(snapshot: &WeatherSnapshot) -> Result<String, TrendError> {
    let first = snapshot.forecast.first().ok_or(TrendError::NoForecast)?;
    let high = parse_high(&first.temp_range)?;
    Ok(format!("Outlook: {}", pizzazz(round1(high - snapshot.temp))))
}

/// Attach `temp_diff`/`diff_str`, preferring the previous record for this city
/// and falling back to the forecast outlook.
pub fn apply_trend(snapshot: &mut WeatherSnapshot, previous: Option<&PreviousDay>) {
    if let Some(prior) = previous.and_then(|p| p.weather.get(&snapshot.name)) {
        let diff = round1(snapshot.temp - prior.temp);
        snapshot.temp_diff = diff;
        snapshot.diff_str = pizzazz(diff);
        return;
    }

    snapshot.diff_str = match forecast_outlook(snapshot) {
        Ok(text) => text,
        Err(err) => {
            warn!(city = %snapshot.name, error = %err, "no trend available");
            NO_TREND.to_string()
        }
    };
}

/// One sentence comparing the coldest and hottest location.
pub fn comparison(snapshots: &[WeatherSnapshot]) -> String {
    if snapshots.len() < 2 {
        return String::new();
    }

    let mut by_temp: Vec<&WeatherSnapshot> = snapshots.iter().collect();
    by_temp.sort_by(|a, b| a.temp.total_cmp(&b.temp));

    let (coldest, hottest) = (by_temp[0], by_temp[by_temp.len() - 1]);
    let raw_spread = hottest.temp - coldest.temp;
    let spread = round1(raw_spread);

    if raw_spread > 3.0 {
        format!("{} is {spread:.1}°C cooler than {} today", coldest.city(), hottest.city())
    } else {
        format!("All cities have similar temperatures today (±{spread:.1}°C)")
    }
}

/// Subject line: leading emojis, the date and the most comfortable city.
///
/// Emojis come from every card in `snapshots`; "Best" is chosen from `live`,
/// or from `snapshots` when nothing was fetched.
pub fn email_subject(
    snapshots: &[WeatherSnapshot],
    live: &[WeatherSnapshot],
    today: NaiveDate,
) -> String {
    let emojis: Vec<&str> = snapshots.iter().take(3).map(|s| s.emoji.as_str()).collect();

    let contenders = if live.is_empty() { snapshots } else { live };
    // first snapshot wins ties
    let best = contenders.iter().fold(None::<&WeatherSnapshot>, |best, s| match best {
        Some(b) if b.comfort_score >= s.comfort_score => Some(b),
        _ => Some(s),
    });

    let mut subject = format!("{} Weather Update - {}", emojis.join(" "), today.format("%b %d"));
    if let Some(best) = best {
        subject.push_str(" | Best: ");
        subject.push_str(best.city());
    }
    subject.trim_start().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ForecastDay;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn observation(temp: f64, humidity: u8, condition: &str) -> Observation {
        Observation {
            temperature_c: temp,
            feels_like_c: temp,
            humidity_pct: humidity,
            wind_speed_mps: 2.0,
            condition: condition.to_string(),
            description: condition.to_lowercase(),
            local_time: NaiveDate::from_ymd_opt(2026, 2, 7)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .expect("valid time"),
        }
    }

    fn snapshot(name: &str, temp: f64, comfort: u8, emoji: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            temp,
            feels_like: temp,
            comfort_score: comfort,
            emoji: emoji.to_string(),
            ..WeatherSnapshot::unavailable(name)
        }
    }

    #[test]
    fn comfort_is_ten_inside_ideal_band() {
        for temp in [20.0, 23.4, 26.0] {
            for humidity in [40, 50, 60] {
                // 4.0 m/s is 14.4 km/h
                for wind in [0.0, 2.5, 4.0] {
                    assert_eq!(comfort_score(temp, humidity, wind), 10);
                }
            }
        }
    }

    #[test]
    fn comfort_uses_secondary_temperature_band() {
        // 7 + 10 + 10 = 27 / 3 = 9
        assert_eq!(comfort_score(29.0, 50, 1.0), 9);
        assert_eq!(comfort_score(16.0, 50, 1.0), 9);
    }

    #[test]
    fn comfort_rounds_after_averaging() {
        // temp 40 -> max(0, 10 - 8.5) = 1.5; humidity 85 -> 3.0; wind 10 m/s -> 36 km/h -> -2 -> 0
        // mean 4.5 / 3 = 1.5 -> 2
        assert_eq!(comfort_score(40.0, 85, 10.0), 2);
    }

    #[test]
    fn comfort_stays_in_range_for_extremes() {
        for temp in [-80.0, -10.0, 0.0, 60.0, f64::MAX, f64::MIN, f64::INFINITY, f64::NAN] {
            for humidity in [0, 100, 255] {
                for wind in [0.0, 50.0, 1e9, f64::NAN] {
                    let score = comfort_score(temp, humidity, wind);
                    assert!(score <= 10, "score {score} for {temp} {humidity} {wind}");
                }
            }
        }
    }

    #[test]
    fn emoji_mapping_and_markers() {
        assert_eq!(condition_emoji("Clear", 25.0), "☀️");
        assert_eq!(condition_emoji("Haze", 20.0), "🌫️");
        assert_eq!(condition_emoji("Tornado", 20.0), "🌡️");
        assert_eq!(condition_emoji("Clear", 36.0), "🔥☀️");
        assert_eq!(condition_emoji("Snow", -2.0), "🥶❄️");
        assert_eq!(condition_emoji("Clear", 35.0), "☀️");
    }

    #[test]
    fn personality_first_match_wins() {
        assert_eq!(personality("Houston, TX", 33.0, 80), "Humid Houston");
        assert_eq!(personality("Houston, TX", 33.0, 50), "Hot Houston");
        assert_eq!(personality("Hyderabad, Telangana", 24.0, 50), "Pleasant Hyderabad");
        assert_eq!(personality("Hyderabad, Telangana", 12.0, 50), "Cool Hyderabad");
        assert_eq!(personality("Hyderabad, Telangana", 17.0, 50), "Breezy Hyderabad");
        assert_eq!(personality("Hyderabad, Telangana", 29.0, 50), "Breezy Hyderabad");
    }

    #[test]
    fn insight_perfect_when_nothing_else_applies() {
        let obs = observation(22.0, 50, "Clear");
        assert_eq!(insight(&obs, "Nowhere, ZZ"), "Perfect weather for outdoor activities");
    }

    #[test]
    fn insight_pleasant_after_rain_warning() {
        let obs = observation(22.0, 80, "Rain");
        assert_eq!(
            insight(&obs, "Nowhere, ZZ"),
            "Rain expected - carry umbrella • High humidity - feels muggy • Otherwise pleasant temperatures"
        );
    }

    #[test]
    fn insight_typical_when_no_phrase() {
        let obs = observation(28.0, 50, "Clouds");
        assert_eq!(insight(&obs, "Nowhere, ZZ"), "Typical weather for the region");
    }

    #[test]
    fn insight_adds_one_local_tip_last() {
        let obs = observation(12.0, 25, "Clear");
        assert_eq!(
            insight(&obs, "Srikalahasthi, AP"),
            "Low humidity - stay hydrated • Cool weather - dress warmly • Ideal temple visit weather"
        );

        let hot = observation(37.0, 50, "Clear");
        assert_eq!(
            insight(&hot, "Houston, TX"),
            "Very hot - limit sun exposure • Plan errands before noon and stay in the shade"
        );
    }

    #[test]
    fn pizzazz_bands() {
        assert!(pizzazz(0.0).contains("Holding steady"));
        assert!(pizzazz(1.5).contains("warmer") && pizzazz(1.5).contains("+1.5"));
        assert!(pizzazz(2.0).contains("A touch warmer"));
        assert!(pizzazz(2.5).contains("Heating up") && pizzazz(2.5).contains("+2.5"));
        assert!(pizzazz(-2.0).contains("A touch cooler") && pizzazz(-2.0).contains("-2.0"));
        assert!(pizzazz(-5.0).contains("Cooling off") && pizzazz(-5.0).contains("-5"));
        assert!(pizzazz(-3.2).contains("-3.2"));
    }

    #[test]
    fn parse_high_handles_negative_ranges() {
        assert_eq!(parse_high("22°-25°"), Ok(25.0));
        assert_eq!(parse_high("-3°--1°"), Ok(-1.0));
        assert_eq!(parse_high("-5°-2°"), Ok(2.0));
        assert!(matches!(parse_high("n/a"), Err(TrendError::MalformedRange(_))));
        assert!(matches!(parse_high("1°-x°"), Err(TrendError::MalformedRange(_))));
    }

    fn previous(date: NaiveDate, entries: Vec<WeatherSnapshot>) -> PreviousDay {
        PreviousDay {
            date,
            weather: entries.into_iter().map(|s| (s.name.clone(), s)).collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn trend_from_previous_day() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 6).expect("date");
        let prev = previous(date, vec![snapshot("Houston, TX", 29.4, 6, "☀️")]);

        let mut today = snapshot("Houston, TX", 32.0, 6, "☀️");
        apply_trend(&mut today, Some(&prev));

        assert_eq!(today.temp_diff, 2.6);
        assert!(today.diff_str.contains("+2.6"));
        assert!(!today.diff_str.starts_with("Outlook"));
    }

    #[test]
    fn trend_falls_back_to_forecast_outlook() {
        let mut today = snapshot("Houston, TX", 30.0, 6, "☀️");
        today.forecast = vec![ForecastDay {
            day: "Sun".into(),
            temp_range: "24°-29°".into(),
            emoji: "☀️".into(),
        }];

        apply_trend(&mut today, None);

        assert_eq!(today.temp_diff, 0.0);
        assert!(today.diff_str.starts_with("Outlook: "));
        assert!(today.diff_str.contains("-1.0"));
    }

    #[test]
    fn trend_defaults_when_forecast_malformed_or_missing() {
        let mut broken = snapshot("Houston, TX", 30.0, 6, "☀️");
        broken.forecast =
            vec![ForecastDay { day: "Sun".into(), temp_range: "??".into(), emoji: "☀️".into() }];
        apply_trend(&mut broken, None);
        assert_eq!(broken.diff_str, NO_TREND);

        let mut bare = snapshot("Houston, TX", 30.0, 6, "☀️");
        let other_city = previous(
            NaiveDate::from_ymd_opt(2026, 2, 6).expect("date"),
            vec![snapshot("Elsewhere", 10.0, 6, "☀️")],
        );
        apply_trend(&mut bare, Some(&other_city));
        assert_eq!(bare.diff_str, NO_TREND);
    }

    #[test]
    fn comparison_names_coldest_first() {
        let snaps = vec![
            snapshot("Houston, TX", 32.0, 6, "☀️"),
            snapshot("Hyderabad, Telangana", 28.0, 9, "🌤️"),
        ];
        assert_eq!(comparison(&snaps), "Hyderabad is 4.0°C cooler than Houston today");
    }

    #[test]
    fn comparison_similar_and_short_inputs() {
        let snaps = vec![snapshot("A, X", 20.0, 6, ""), snapshot("B, Y", 22.5, 6, "")];
        assert_eq!(comparison(&snaps), "All cities have similar temperatures today (±2.5°C)");
        assert_eq!(comparison(&snaps[..1]), "");
    }

    #[test]
    fn subject_uses_emojis_and_best_city() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 7).expect("date");
        let snaps = vec![
            snapshot("Houston, TX", 32.0, 6, "🌧️"),
            snapshot("Hyderabad, Telangana", 24.0, 9, "☀️"),
            snapshot("Srikalahasthi, AP", 26.0, 8, "🌤️"),
        ];

        let subject = email_subject(&snaps, &snaps, today);
        assert_eq!(subject, "🌧️ ☀️ 🌤️ Weather Update - Feb 07 | Best: Hyderabad");
        assert!(subject.contains("☀️"));
        assert!(subject.ends_with("Hyderabad"));
    }

    #[test]
    fn subject_ties_go_to_first_city() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 7).expect("date");
        let snaps = vec![
            snapshot("First, A", 20.0, 8, "☀️"),
            snapshot("Second, B", 20.0, 8, "☀️"),
            snapshot("Third, C", 20.0, 7, "☀️"),
            snapshot("Fourth, D", 20.0, 8, "⛈️"),
        ];

        let subject = email_subject(&snaps, &snaps, today);
        assert!(subject.ends_with("Best: First"));
        assert!(!subject.contains("⛈️"));
    }

    #[test]
    fn unavailable_city_is_never_best() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 7).expect("date");
        let houston = WeatherSnapshot::unavailable("Houston, TX");
        let hyderabad = snapshot("Hyderabad, Telangana", 38.0, 0, "🔥☀️");
        let cards = vec![houston.clone(), hyderabad.clone()];

        let subject = email_subject(&cards, &[hyderabad], today);
        assert_eq!(subject, "❓ 🔥☀️ Weather Update - Feb 07 | Best: Hyderabad");

        // with nothing live the cards themselves are ranked
        let subject = email_subject(&[houston], &[], today);
        assert!(subject.ends_with("Best: Houston"));
    }
}

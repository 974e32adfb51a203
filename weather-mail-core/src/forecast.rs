use chrono::{NaiveDate, Timelike};
use std::collections::BTreeMap;

use crate::{
    analytics::condition_emoji,
    model::{ForecastDay, ForecastEntry},
};

/// Days shown in the report's forecast strip.
pub const FORECAST_DAYS: usize = 5;

struct DayAccumulator {
    low: f64,
    high: f64,
    condition: String,
}

/// Collapse 3-hourly entries into per-day summaries for the days after `today`.
///
/// A day's condition is its first entry's, replaced by any entry at local noon
/// (the last noon entry wins). Output is ascending by date, one entry per day.
pub fn daily_summary(entries: &[ForecastEntry], today: NaiveDate) -> Vec<ForecastDay> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for entry in entries {
        let date = entry.local_time.date();
        if date <= today {
            continue;
        }

        let acc = days.entry(date).or_insert_with(|| DayAccumulator {
            low: entry.temperature_c,
            high: entry.temperature_c,
            condition: entry.condition.clone(),
        });

        acc.low = acc.low.min(entry.temperature_c);
        acc.high = acc.high.max(entry.temperature_c);

        if entry.local_time.hour() == 12 {
            acc.condition = entry.condition.clone();
        }
    }

    days.into_iter()
        .take(FORECAST_DAYS)
        .map(|(date, acc)| ForecastDay {
            day: date.format("%a").to_string(),
            temp_range: format!("{}°-{}°", whole_degrees(acc.low), whole_degrees(acc.high)),
            emoji: condition_emoji(&acc.condition, acc.high),
        })
        .collect()
}

/// Half-away-from-zero rounding, with no "-0".
fn whole_degrees(value: f64) -> i64 {
    value.round() as i64
}

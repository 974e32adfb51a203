use chrono::NaiveDate;

use crate::{
    chart::LegendEntry,
    model::{ForecastDay, WeatherSnapshot},
    render::{Context, comfort_class},
};

/// Everything the email template needs for one run.
#[derive(Debug, Clone, Default)]
pub struct EmailContext {
    pub date: String,
    pub locations: Vec<WeatherSnapshot>,
    pub comparison: Option<String>,
    /// `cid:` reference of the temperature chart, when one was rendered.
    pub chart: Option<String>,
    pub forecast_chart: Option<String>,
    /// Captions under the temperature chart, then its colour key.
    pub chart_legend: Vec<LegendEntry>,
    pub comfort_key: Vec<LegendEntry>,
    pub forecast_legend: Vec<LegendEntry>,
}

impl EmailContext {
    pub fn new(today: NaiveDate, locations: Vec<WeatherSnapshot>) -> Self {
        Self {
            date: report_date(today),
            locations,
            ..Self::default()
        }
    }

    pub fn to_context(&self) -> Context {
        Context::new()
            .text("date", self.date.as_str())
            .optional_text("comparison", self.comparison.as_deref().filter(|c| !c.is_empty()))
            .optional_text("chart", self.chart.as_deref())
            .optional_text("forecast_chart", self.forecast_chart.as_deref())
            .list("locations", self.locations.iter().map(location_context).collect())
            .list("chart_legend", legend_context(&self.chart_legend))
            .list("comfort_key", legend_context(&self.comfort_key))
            .list("forecast_legend", legend_context(&self.forecast_legend))
    }
}

/// Long date used in the report header, e.g. "Saturday, February 07, 2026".
pub fn report_date(today: NaiveDate) -> String {
    today.format("%A, %B %d, %Y").to_string()
}

fn location_context(snapshot: &WeatherSnapshot) -> Context {
    Context::new()
        .text("name", snapshot.name.as_str())
        .text("emoji", snapshot.emoji.as_str())
        .text("description", snapshot.description.as_str())
        .text("temp", format!("{:.1}", snapshot.temp))
        .text("feels_like", format!("{:.1}", snapshot.feels_like))
        .text("humidity", snapshot.humidity.to_string())
        .text("wind_speed", format!("{:.1}", snapshot.wind_speed))
        .text("comfort_score", snapshot.comfort_score.to_string())
        .text("comfort_class", comfort_class(snapshot.comfort_score))
        .text("personality", snapshot.personality.as_str())
        .text("insight", snapshot.insight.as_str())
        .text("trend", snapshot.diff_str.as_str())
        .list("forecast", snapshot.forecast.iter().map(forecast_context).collect())
}

fn legend_context(entries: &[LegendEntry]) -> Vec<Context> {
    entries
        .iter()
        .map(|e| Context::new().text("label", e.label.as_str()).text("color", e.color.as_str()))
        .collect()
}

fn forecast_context(day: &ForecastDay) -> Context {
    Context::new()
        .text("day", day.day.as_str())
        .text("temp_range", day.temp_range.as_str())
        .text("emoji", day.emoji.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DEFAULT_TEMPLATE, render};

    fn snapshot(name: &str, temp: f64, comfort: u8) -> WeatherSnapshot {
        WeatherSnapshot {
            temp,
            feels_like: temp + 1.0,
            humidity: 55,
            comfort_score: comfort,
            emoji: "☀️".to_string(),
            personality: format!("Pleasant {name}"),
            insight: "Perfect weather for outdoor activities".to_string(),
            diff_str: "📈 A touch warmer (+1.5°C)".to_string(),
            ..WeatherSnapshot::unavailable(name)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 7).expect("date")
    }

    #[test]
    fn report_date_is_long_form() {
        assert_eq!(report_date(today()), "Saturday, February 07, 2026");
    }

    #[test]
    fn renders_one_card_per_location_in_order() {
        let ctx = EmailContext::new(
            today(),
            vec![snapshot("Houston, TX", 32.0, 6), snapshot("Hyderabad, Telangana", 28.0, 9)],
        );

        let html = render(DEFAULT_TEMPLATE, &ctx.to_context());

        assert_eq!(html.matches("class=\"location-card\"").count(), 2);
        let houston = html.find("Houston, TX").expect("houston card");
        let hyderabad = html.find("Hyderabad, Telangana").expect("hyderabad card");
        assert!(houston < hyderabad);
        assert!(html.contains("32.0°C"));
        assert!(html.contains("comfort-score medium"));
        assert!(html.contains("comfort-score high"));
        assert!(html.contains("+1.5°C"));
        assert!(!html.contains("{%"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn absent_comparison_and_charts_are_removed() {
        let ctx = EmailContext::new(today(), vec![snapshot("Houston, TX", 32.0, 6)]);
        let html = render(DEFAULT_TEMPLATE, &ctx.to_context());

        assert!(!html.contains("Comparison:"));
        assert!(!html.contains("{% if comparison %}"));
        assert!(!html.contains("<img"));
        assert!(!html.contains("class=\"forecast\""));
    }

    #[test]
    fn present_sections_are_filled() {
        let mut houston = snapshot("Houston, TX", 32.0, 6);
        houston.forecast = vec![ForecastDay {
            day: "Sun".to_string(),
            temp_range: "24°-31°".to_string(),
            emoji: "🌤️".to_string(),
        }];

        let ctx = EmailContext {
            comparison: Some("Hyderabad is 4.0°C cooler than Houston today".to_string()),
            chart: Some("cid:temperature-chart".to_string()),
            forecast_chart: Some("cid:forecast-chart".to_string()),
            ..EmailContext::new(today(), vec![houston])
        };

        let html = render(DEFAULT_TEMPLATE, &ctx.to_context());

        assert!(
            html.contains("Comparison:</strong> Hyderabad is 4.0°C cooler than Houston today")
        );
        assert!(html.contains(r#"src="cid:temperature-chart""#));
        assert!(html.contains(r#"src="cid:forecast-chart""#));
        assert!(html.contains("24°-31°"));
        assert!(html.contains("Saturday, February 07, 2026"));
    }

    #[test]
    fn empty_comparison_is_treated_as_absent() {
        let ctx = EmailContext {
            comparison: Some(String::new()),
            ..EmailContext::new(today(), Vec::new())
        };
        assert!(ctx.to_context().get("comparison").is_none());
    }
}

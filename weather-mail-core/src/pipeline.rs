//! The daily run: fetch → analyze → persist → render → send.
//!
//! Every step runs sequentially on the calling task. Per-location and
//! per-recipient failures are carried as values ([`LocationReport`],
//! [`DeliveryReport`]); only "no weather at all" and "nobody got the email"
//! end the run with an error.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::{fs, path::Path};
use tracing::{info, warn};

use crate::{
    analytics::{
        apply_trend, comfort_score, comparison, condition_emoji, email_subject, insight,
        personality,
    },
    chart::{
        ChartRenderer, PngCharts, Slot, comfort_key, forecast_legend, temperature_legend,
    },
    config::Settings,
    error::PipelineError,
    forecast::daily_summary,
    history::HistoryStore,
    mailer::{DeliveryReport, EmailMessage, InlineImage, Mailer, SendGridMailer, deliver},
    model::{ForecastEntry, Location, Observation, WeatherSnapshot, round1},
    provider::{WeatherProvider, provider_from_settings},
    render::{DEFAULT_TEMPLATE, Template},
    report::EmailContext,
};

pub const TEMPERATURE_CHART_ID: &str = "temperature-chart";
pub const FORECAST_CHART_ID: &str = "forecast-chart";

/// One location's result for this run.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationReport {
    Live(WeatherSnapshot),
    /// Fetch failed; the snapshot is a placeholder.
    Unavailable { snapshot: WeatherSnapshot, reason: String },
}

impl LocationReport {
    pub fn snapshot(&self) -> &WeatherSnapshot {
        match self {
            LocationReport::Live(snapshot) => snapshot,
            LocationReport::Unavailable { snapshot, .. } => snapshot,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, LocationReport::Live(_))
    }
}

/// Build a snapshot from raw provider data. Trend fields are filled later.
pub fn analyze(
    location: &Location,
    observation: &Observation,
    forecast: &[ForecastEntry],
) -> WeatherSnapshot {
    let temp = observation.temperature_c;
    let humidity = observation.humidity_pct;
    let wind = observation.wind_speed_mps;

    WeatherSnapshot {
        name: location.name.clone(),
        temp: round1(temp),
        feels_like: round1(observation.feels_like_c),
        humidity,
        wind_speed: round1(wind),
        weather_main: observation.condition.clone(),
        description: observation.description.clone(),
        comfort_score: comfort_score(temp, humidity, wind),
        emoji: condition_emoji(&observation.condition, temp),
        personality: personality(&location.name, temp, humidity),
        insight: insight(observation, &location.name),
        forecast: daily_summary(forecast, observation.local_time.date()),
        temp_diff: 0.0,
        diff_str: String::new(),
    }
}

/// Fetch and analyze one location. A failed forecast only empties the strip; a
/// failed observation yields a placeholder.
pub async fn fetch_location(provider: &dyn WeatherProvider, location: &Location) -> LocationReport {
    let observation = match provider.current(location).await {
        Ok(observation) => observation,
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(city = %location.name, error = %reason, "using placeholder snapshot");
            return LocationReport::Unavailable {
                snapshot: WeatherSnapshot::unavailable(&location.name),
                reason,
            };
        }
    };

    let forecast = provider.forecast(location).await.unwrap_or_else(|err| {
        warn!(city = %location.name, error = %format!("{err:#}"), "forecast unavailable");
        Vec::new()
    });

    LocationReport::Live(analyze(location, &observation, &forecast))
}

/// Fetch every location in order. Fails only when none could be fetched.
pub async fn collect(
    provider: &dyn WeatherProvider,
    locations: &[Location],
) -> Result<Vec<LocationReport>, PipelineError> {
    let mut reports = Vec::with_capacity(locations.len());
    for location in locations {
        reports.push(fetch_location(provider, location).await);
    }

    if !reports.iter().any(LocationReport::is_live) {
        return Err(PipelineError::NoWeatherData(locations.len()));
    }
    Ok(reports)
}

/// Rendered email plus the data it was built from.
#[derive(Debug, Clone)]
pub struct Report {
    pub message: EmailMessage,
    pub locations: Vec<LocationReport>,
    pub comparison: String,
}

impl Report {
    pub fn snapshots(&self) -> Vec<WeatherSnapshot> {
        self.locations.iter().map(|r| r.snapshot().clone()).collect()
    }

    pub fn unavailable(&self) -> usize {
        self.locations.iter().filter(|r| !r.is_live()).count()
    }
}

/// Everything the run needs apart from the mail transport.
pub struct Pipeline<'a> {
    pub provider: &'a dyn WeatherProvider,
    pub charts: &'a dyn ChartRenderer,
    pub history: &'a HistoryStore,
    pub template: &'a Template,
}

impl Pipeline<'_> {
    /// Fetch, analyze and render. With `persist`, today's live snapshots are
    /// written to history; a write failure is logged and ignored.
    pub async fn prepare(
        &self,
        locations: &[Location],
        today: NaiveDate,
        persist: bool,
    ) -> Result<Report, PipelineError> {
        let mut reports = collect(self.provider, locations).await?;
        info!(
            fetched = reports.iter().filter(|r| r.is_live()).count(),
            total = reports.len(),
            "weather collected"
        );

        let previous = self.history.get_previous_day_data(today);
        if let Some(prev) = &previous {
            info!(date = %prev.date, "comparing against previous record");
        }

        for report in &mut reports {
            if let LocationReport::Live(snapshot) = report {
                apply_trend(snapshot, previous.as_ref());
            }
        }

        let live: Vec<WeatherSnapshot> = reports
            .iter()
            .filter_map(|r| match r {
                LocationReport::Live(snapshot) => Some(snapshot.clone()),
                LocationReport::Unavailable { .. } => None,
            })
            .collect();

        if persist {
            if let Err(err) = self.history.save_daily_record(&live, today) {
                warn!(path = %self.history.path().display(), error = %err, "history not saved");
            }
        }

        let all: Vec<WeatherSnapshot> = reports.iter().map(|r| r.snapshot().clone()).collect();
        let comparison = comparison(&live);
        let subject = email_subject(&all, &live, today);

        let slots: Vec<Slot<'_>> = reports
            .iter()
            .map(|r| match r {
                LocationReport::Live(snapshot) => Some(snapshot),
                LocationReport::Unavailable { .. } => None,
            })
            .collect();

        let mut context = EmailContext {
            comparison: Some(comparison.clone()),
            ..EmailContext::new(today, all)
        };
        let mut images = Vec::new();

        match self.charts.temperature_chart(&slots) {
            Ok(png) => {
                let image = InlineImage::png(TEMPERATURE_CHART_ID, png);
                context.chart = Some(image.cid());
                context.chart_legend = temperature_legend(&slots);
                context.comfort_key = comfort_key();
                images.push(image);
            }
            Err(err) => warn!(error = %format!("{err:#}"), "temperature chart skipped"),
        }
        match self.charts.forecast_chart(&slots) {
            Ok(Some(png)) => {
                let image = InlineImage::png(FORECAST_CHART_ID, png);
                context.forecast_chart = Some(image.cid());
                context.forecast_legend = forecast_legend(&slots);
                images.push(image);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %format!("{err:#}"), "forecast chart skipped"),
        }

        let html = self.template.render(&context.to_context());

        Ok(Report {
            message: EmailMessage { subject, html, images },
            locations: reports,
            comparison,
        })
    }
}

/// Send the report to every recipient. Fails only if nobody received it.
pub async fn send_report(
    mailer: &dyn Mailer,
    report: &Report,
    recipients: &[String],
) -> Result<DeliveryReport, PipelineError> {
    let delivery = deliver(mailer, &report.message, recipients).await;
    info!(sent = delivery.sent.len(), total = delivery.total(), "delivery finished");

    if delivery.any_sent() {
        Ok(delivery)
    } else {
        Err(PipelineError::NothingSent(delivery.total()))
    }
}

/// Read a custom template, or fall back to the bundled one.
pub fn load_template(path: Option<&Path>) -> Result<Template> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read template: {}", path.display()))?;
            Ok(Template::parse(&text))
        }
        None => Ok(Template::parse(DEFAULT_TEMPLATE)),
    }
}

/// Result of a complete run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub subject: String,
    pub locations: usize,
    pub unavailable: usize,
    pub delivery: DeliveryReport,
}

/// Production wiring: OpenWeather, SendGrid, PNG charts and the history file.
pub async fn run(settings: &Settings, today: NaiveDate) -> Result<RunSummary> {
    let provider = provider_from_settings(settings)?;
    let mailer =
        SendGridMailer::new(settings.sendgrid_api_key.clone(), settings.sender.clone())?;
    let history = HistoryStore::new(&settings.history_path);
    let template = load_template(settings.template_path.as_deref())?;
    let charts = PngCharts::default();

    let pipeline = Pipeline {
        provider: provider.as_ref(),
        charts: &charts,
        history: &history,
        template: &template,
    };

    let report = pipeline.prepare(&settings.locations, today, true).await?;
    info!(subject = %report.message.subject, "report rendered");

    let delivery = send_report(&mailer, &report, &settings.recipients).await?;

    Ok(RunSummary {
        subject: report.message.subject.clone(),
        locations: report.locations.len(),
        unavailable: report.unavailable(),
        delivery,
    })
}

/// Fetch and render without sending or touching history.
pub async fn preview(settings: &Settings, today: NaiveDate) -> Result<Report> {
    let provider = provider_from_settings(settings)?;
    let history = HistoryStore::new(&settings.history_path);
    let template = load_template(settings.template_path.as_deref())?;
    let charts = PngCharts::default();

    let pipeline = Pipeline {
        provider: provider.as_ref(),
        charts: &charts,
        history: &history,
        template: &template,
    };

    Ok(pipeline.prepare(&settings.locations, today, false).await?)
}

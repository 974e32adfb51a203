//! PNG charts embedded in the email as inline attachments.
//!
//! Bars and polylines only; labels live in the surrounding HTML.

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::{analytics::parse_high, model::WeatherSnapshot, render::comfort_class};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([73, 80, 87]);
const GRID: Rgb<u8> = Rgb([233, 236, 239]);
const GOOD: Rgb<u8> = Rgb([40, 167, 69]);
const FAIR: Rgb<u8> = Rgb([255, 193, 7]);
const POOR: Rgb<u8> = Rgb([220, 53, 69]);
const SERIES: [Rgb<u8>; 5] = [
    Rgb([0, 123, 255]),
    Rgb([40, 167, 69]),
    Rgb([220, 53, 69]),
    Rgb([111, 66, 193]),
    Rgb([253, 126, 20]),
];

const MARGIN: u32 = 24;

/// One card's worth of chart input, in card order. `None` marks a location
/// whose data was unavailable; it keeps its slot so bars line up with cards.
pub type Slot<'a> = Option<&'a WeatherSnapshot>;

/// Produces chart images from the run's snapshots.
pub trait ChartRenderer {
    /// Actual and feels-like temperature per location.
    fn temperature_chart(&self, slots: &[Slot<'_>]) -> Result<Vec<u8>>;

    /// Daily highs per location, or `None` when no location has a forecast.
    fn forecast_chart(&self, slots: &[Slot<'_>]) -> Result<Option<Vec<u8>>>;
}

/// A caption line shown under a chart, with the colour it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    /// CSS colour, e.g. `#28a745`.
    pub color: String,
}

impl LegendEntry {
    fn new(label: String, color: Rgb<u8>) -> Self {
        Self { label, color: hex(color) }
    }
}

/// Colour key for the temperature chart's comfort bands.
pub fn comfort_key() -> Vec<LegendEntry> {
    vec![
        LegendEntry::new("Comfortable (8-10)".to_string(), GOOD),
        LegendEntry::new("Fair (6-7)".to_string(), FAIR),
        LegendEntry::new("Poor (0-5)".to_string(), POOR),
    ]
}

/// One entry per available location, left to right as the bars are drawn.
pub fn temperature_legend(slots: &[Slot<'_>]) -> Vec<LegendEntry> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.map(|s| (i, s)))
        .map(|(i, s)| {
            LegendEntry::new(
                format!("{}. {} {:.1}°C (feels {:.1}°C)", i + 1, s.city(), s.temp, s.feels_like),
                comfort_color(s.comfort_score),
            )
        })
        .collect()
}

/// One entry per location that has a forecast line, in its series colour.
pub fn forecast_legend(slots: &[Slot<'_>]) -> Vec<LegendEntry> {
    forecast_series(slots)
        .into_iter()
        .map(|(i, s, _)| LegendEntry::new(s.city().to_string(), series_color(i)))
        .collect()
}

/// Series colour for the location at `index` in card order.
pub fn series_color(index: usize) -> Rgb<u8> {
    SERIES[index % SERIES.len()]
}

/// Card index, snapshot and parsed daily highs for every location with a
/// usable forecast.
fn forecast_series<'a>(slots: &[Slot<'a>]) -> Vec<(usize, &'a WeatherSnapshot, Vec<f64>)> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| {
            let snapshot = (*slot)?;
            let highs: Vec<f64> = snapshot
                .forecast
                .iter()
                .filter_map(|d| parse_high(&d.temp_range).ok())
                .collect();
            (!highs.is_empty()).then_some((i, snapshot, highs))
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct PngCharts {
    width: u32,
    height: u32,
}

impl Default for PngCharts {
    fn default() -> Self {
        Self { width: 576, height: 288 }
    }
}

impl PngCharts {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width: width.max(MARGIN * 4), height: height.max(MARGIN * 4) }
    }

    fn canvas(&self) -> RgbImage {
        RgbImage::from_pixel(self.width, self.height, BACKGROUND)
    }

    fn plot_height(&self) -> f64 {
        f64::from(self.height - 2 * MARGIN)
    }

    /// Map a value in `[lo, hi]` to a pixel row.
    fn row(&self, value: f64, lo: f64, hi: f64) -> i64 {
        let span = if hi > lo { hi - lo } else { 1.0 };
        let frac = ((value - lo) / span).clamp(0.0, 1.0);
        (f64::from(self.height - MARGIN) - frac * self.plot_height()).round() as i64
    }

    fn draw_grid(&self, img: &mut RgbImage, lo: f64, hi: f64) {
        let step = 5.0;
        let mut t = (lo / step).ceil() * step;
        while t <= hi {
            let y = self.row(t, lo, hi);
            draw_line(img, (i64::from(MARGIN), y), (i64::from(self.width - MARGIN), y), GRID);
            t += step;
        }
    }
}

impl ChartRenderer for PngCharts {
    fn temperature_chart(&self, slots: &[Slot<'_>]) -> Result<Vec<u8>> {
        let mut img = self.canvas();

        let values = slots.iter().flatten().flat_map(|s| [s.temp, s.feels_like]);
        let (lo, hi) = value_range(values);
        self.draw_grid(&mut img, lo, hi);

        let zero = self.row(0.0, lo, hi);
        let slot_count = slots.len().max(1) as i64;
        let slot = i64::from(self.width - 2 * MARGIN) / slot_count;
        let bar = (slot / 3).max(1);

        for (i, snapshot) in slots.iter().enumerate() {
            let left = i64::from(MARGIN) + slot * i as i64 + slot / 2 - bar;

            let Some(snapshot) = snapshot else {
                // unavailable: a tick on the axis, no bars
                fill_rect(&mut img, left, zero - 3, left + 2 * bar, zero + 3, GRID);
                continue;
            };
            let color = comfort_color(snapshot.comfort_score);

            let actual = self.row(snapshot.temp, lo, hi);
            fill_rect(&mut img, left, actual.min(zero), left + bar, actual.max(zero), color);

            let feels = self.row(snapshot.feels_like, lo, hi);
            let right = left + bar;
            fill_rect(
                &mut img,
                right,
                feels.min(zero),
                right + bar,
                feels.max(zero),
                lighten(color),
            );
        }

        draw_line(
            &mut img,
            (i64::from(MARGIN), zero),
            (i64::from(self.width - MARGIN), zero),
            AXIS,
        );
        encode_png(&img)
    }

    fn forecast_chart(&self, slots: &[Slot<'_>]) -> Result<Option<Vec<u8>>> {
        let series = forecast_series(slots);
        if series.is_empty() {
            return Ok(None);
        }

        let mut img = self.canvas();
        let (lo, hi) = value_range(series.iter().flat_map(|(_, _, highs)| highs.iter().copied()));
        self.draw_grid(&mut img, lo, hi);

        let longest = series.iter().map(|(_, _, highs)| highs.len()).max().unwrap_or(1);
        let points = longest.max(2) as u32;
        let step = (self.width - 2 * MARGIN) / (points - 1);

        for (index, _, highs) in &series {
            let color = series_color(*index);
            let coords: Vec<(i64, i64)> = highs
                .iter()
                .enumerate()
                .map(|(n, &t)| (i64::from(MARGIN + step * n as u32), self.row(t, lo, hi)))
                .collect();

            for pair in coords.windows(2) {
                draw_line(&mut img, pair[0], pair[1], color);
            }
            for &(x, y) in &coords {
                fill_rect(&mut img, x - 3, y - 3, x + 3, y + 3, color);
            }
        }

        encode_png(&img).map(Some)
    }
}

/// Bar colour by comfort band.
fn comfort_color(score: u8) -> Rgb<u8> {
    match comfort_class(score) {
        "high" => GOOD,
        "medium" => FAIR,
        _ => POOR,
    }
}

fn hex(Rgb([r, g, b]): Rgb<u8>) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn lighten(Rgb([r, g, b]): Rgb<u8>) -> Rgb<u8> {
    let mix = |c: u8| ((u16::from(c) + 255) / 2) as u8;
    Rgb([mix(r), mix(g), mix(b)])
}

/// Padded value range that always includes zero.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (lo - 2.0, hi + 2.0)
}

fn fill_rect(img: &mut RgbImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    for y in y0.max(0)..=y1.min(h - 1) {
        for x in x0.max(0)..=x1.min(w - 1) {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).max(1);
    for s in 0..=steps {
        let x = from.0 + dx * s / steps;
        let y = from.1 + dy * s / steps;
        // two pixels thick
        fill_rect(img, x, y, x, y + 1, color);
    }
}

fn encode_png(img: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).context("Failed to encode chart as PNG")?;
    Ok(bytes.into_inner())
}

//! Trailing-24h hourly downsampling for the trend charts.

use crate::dashboard::models::{Channel, SensorReading};
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const WINDOW_HOURS: i64 = 24;

/// Bins kept for display.
pub const DISPLAY_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourBin {
    /// Start of the clock hour in the display offset.
    pub hour: DateTime<FixedOffset>,
    pub reading: SensorReading,
}

fn hour_key(timestamp: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    timestamp
        .with_timezone(&offset)
        .with_minute(0)?
        .with_second(0)?
        .with_nanosecond(0)
}

/// Latest reading per clock hour inside the window, newest hour first.
pub fn hourly_bins(
    readings: &[SensorReading],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<HourBin> {
    let cutoff = now - Duration::hours(WINDOW_HOURS);
    let mut bins: BTreeMap<DateTime<FixedOffset>, &SensorReading> = BTreeMap::new();

    for reading in readings.iter().filter(|r| r.timestamp >= cutoff) {
        let Some(key) = hour_key(reading.timestamp, offset) else {
            continue;
        };
        match bins.get(&key) {
            Some(existing) if existing.timestamp >= reading.timestamp => {}
            _ => {
                bins.insert(key, reading);
            }
        }
    }

    bins.into_iter()
        .rev()
        .map(|(hour, reading)| HourBin {
            hour,
            reading: reading.clone(),
        })
        .collect()
}

/// The most recent [`DISPLAY_BINS`] hours, newest first.
pub fn downsample(
    readings: &[SensorReading],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<HourBin> {
    let mut bins = hourly_bins(readings, now, offset);
    bins.truncate(DISPLAY_BINS);
    bins
}

/// Same bins as [`downsample`] in chronological order for chart x-axes.
pub fn chart_bins(
    readings: &[SensorReading],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Vec<HourBin> {
    let mut bins = downsample(readings, now, offset);
    bins.reverse();
    bins
}

/// One chart line: labels on the x-axis and the channel's values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub channel: Channel,
    pub label: String,
    pub labels: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl TrendSeries {
    pub fn from_bins(channel: Channel, bins: &[HourBin]) -> Self {
        let label = if channel.unit().is_empty() {
            channel.label().to_string()
        } else {
            format!("{} ({})", channel.label(), channel.unit())
        };

        Self {
            channel,
            label,
            labels: bins
                .iter()
                .map(|b| b.hour.format("%I:%M %p").to_string())
                .collect(),
            values: bins
                .iter()
                .map(|b| b.reading.value(channel).map(round2))
                .collect(),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

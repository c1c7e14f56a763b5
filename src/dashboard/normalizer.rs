use crate::dashboard::models::{
    Channel, GrowthStatus, PredictionRecord, SensorReading, UNKNOWN_STAGE,
};
use crate::error::{AppError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub total_records: usize,
    pub kept: usize,
    pub dropped: usize,
}

impl NormalizeStats {
    fn record(&mut self, kept: bool) {
        self.total_records += 1;
        if kept {
            self.kept += 1;
        } else {
            self.dropped += 1;
        }
    }
}

/// Turns raw JSON rows into typed, ordered records.
///
/// Naive timestamps (SQLite's `YYYY-MM-DD HH:MM:SS`) are read in the fixed
/// display offset. Rows whose key date does not parse are dropped and only
/// counted in the returned stats.
pub struct Normalizer {
    offset: FixedOffset,
}

impl Normalizer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Readings sorted newest first.
    pub fn sensor_readings(&self, records: &[Value]) -> (Vec<SensorReading>, NormalizeStats) {
        let mut stats = NormalizeStats::default();
        let mut readings = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            match self.sensor_reading(record) {
                Ok(reading) => {
                    readings.push(reading);
                    stats.record(true);
                }
                Err(e) => {
                    stats.record(false);
                    debug!("Dropping sensor record {}: {}", idx, e);
                }
            }
        }

        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        (readings, stats)
    }

    /// Predictions sorted by stage date, earliest first. Same-day records
    /// keep their input order.
    pub fn predictions(&self, records: &[Value]) -> (Vec<PredictionRecord>, NormalizeStats) {
        let mut stats = NormalizeStats::default();
        let mut predictions = Vec::with_capacity(records.len());

        for (idx, record) in records.iter().enumerate() {
            match self.prediction(record) {
                Ok(prediction) => {
                    predictions.push(prediction);
                    stats.record(true);
                }
                Err(e) => {
                    stats.record(false);
                    debug!("Dropping prediction record {}: {}", idx, e);
                }
            }
        }

        predictions.sort_by_key(|p| p.stage_date);
        (predictions, stats)
    }

    fn sensor_reading(&self, record: &Value) -> Result<SensorReading> {
        let object = record
            .as_object()
            .ok_or_else(|| AppError::Parse("record is not an object".to_string()))?;

        let raw_timestamp = object
            .get("timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Parse("missing timestamp".to_string()))?;

        let mut reading = SensorReading::empty(parse_timestamp(raw_timestamp, self.offset)?);
        for channel in Channel::ALL {
            reading.set_value(channel, parse_optional_number(object.get(channel.key())));
        }
        reading.pump_status = object
            .get("pump_status")
            .or_else(|| object.get("pumpStatus"))
            .and_then(parse_optional_bool);

        Ok(reading)
    }

    fn prediction(&self, record: &Value) -> Result<PredictionRecord> {
        let object = record
            .as_object()
            .ok_or_else(|| AppError::Parse("record is not an object".to_string()))?;

        let raw_date = object
            .get("stage_date")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Parse("missing stage_date".to_string()))?;
        let stage_date = parse_date(raw_date, self.offset)?;

        let stage_name = object
            .get("stage_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_STAGE)
            .to_string();

        let yield_predicted = parse_optional_number(object.get("yield_predicted"))
            .or_else(|| parse_optional_number(object.get("yield_count")));

        let status = object
            .get("status")
            .or_else(|| object.get("yield_status"))
            .and_then(Value::as_str)
            .map(GrowthStatus::parse_lenient)
            .unwrap_or_default();

        let optional_date = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .and_then(|s| parse_date(s, self.offset).ok())
        };

        Ok(PredictionRecord {
            stage_date,
            stage_name,
            yield_predicted,
            yield_date: optional_date("yield_date").or(Some(stage_date)),
            status,
            notes: object
                .get("notes")
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            batch_start: optional_date("batch_start"),
        })
    }
}

/// Parse an instant. Strings without an offset are read in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::Parse("empty timestamp".to_string()));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return local_to_utc(naive, offset);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return local_to_utc(date.and_time(chrono::NaiveTime::MIN), offset);
    }

    Err(AppError::Parse(format!("unrecognized timestamp '{}'", raw)))
}

/// Parse a calendar date. Full timestamps are truncated to the day they fall
/// on in `offset`.
pub fn parse_date(raw: &str, offset: FixedOffset) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_timestamp(trimmed, offset).map(|ts| ts.with_timezone(&offset).date_naive())
}

fn local_to_utc(naive: NaiveDateTime, offset: FixedOffset) -> Result<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Parse(format!("timestamp '{}' out of range", naive)))
}

fn parse_optional_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_optional_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Some(true),
            "off" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

//! Picks the "current" reading and growth stage out of a refreshed data set.

use crate::dashboard::models::{PredictionRecord, SensorReading};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// The calendar day `now` falls on in the display offset.
pub fn today_in(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// First element of a newest-first reading list.
pub fn latest_sensor(readings: &[SensorReading]) -> Option<&SensorReading> {
    readings.first()
}

/// The prediction with the greatest stage date not after `today`.
///
/// Future-dated stages never qualify. When several records share the winning
/// date the earliest one in input order is returned.
pub fn latest_prediction(
    predictions: &[PredictionRecord],
    today: NaiveDate,
) -> Option<&PredictionRecord> {
    predictions
        .iter()
        .filter(|p| p.stage_date <= today)
        .fold(None, |best: Option<&PredictionRecord>, candidate| match best {
            Some(current) if current.stage_date >= candidate.stage_date => Some(current),
            _ => Some(candidate),
        })
}

/// Start of the current batch, taken from the first record of the list.
pub fn batch_start(predictions: &[PredictionRecord]) -> Option<NaiveDate> {
    predictions.first().and_then(|p| p.batch_start)
}

/// 1-based day number of the batch on `today`, if the batch has started.
pub fn growth_day(predictions: &[PredictionRecord], today: NaiveDate) -> Option<i64> {
    let start = batch_start(predictions)?;
    let days = (today - start).num_days();
    (days >= 0).then_some(days + 1)
}

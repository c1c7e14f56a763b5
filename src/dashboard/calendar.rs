//! Month-grid growth calendar.
//!
//! Predictions are binned by stage date, readings by the day their timestamp
//! falls on in the display offset (latest reading wins). The grid spans whole
//! Sunday-first weeks around the reference month and is rebuilt from scratch
//! on every refresh.

use crate::dashboard::models::{GrowthStatus, PredictionRecord, SensorReading};
use crate::error::{AppError, Result};
use chrono::{Datelike, Duration, FixedOffset, Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Stage entries shown inline per day before collapsing into "+N more".
pub const INLINE_STAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthRef {
    first: NaiveDate,
}

impl MonthRef {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    /// Parse `YYYY-MM`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (year, month) = raw
            .trim()
            .split_once('-')
            .ok_or_else(|| AppError::BadRequest(format!("month '{}' must be YYYY-MM", raw)))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| AppError::BadRequest(format!("invalid year in '{}'", raw)))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest(format!("invalid month in '{}'", raw)))?;
        Self::new(year, month)
            .ok_or_else(|| AppError::BadRequest(format!("month '{}' out of range", raw)))
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first - Duration::days(1)
    }

    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }

    pub fn next(&self) -> Self {
        Self {
            first: self.first + Months::new(1),
        }
    }

    pub fn prev(&self) -> Self {
        Self {
            first: self.first - Months::new(1),
        }
    }

    /// Sunday on or before the 1st through Saturday on or after the last day.
    pub fn grid_days(&self) -> Vec<NaiveDate> {
        let start = self.first
            - Duration::days(self.first.weekday().num_days_from_sunday() as i64);
        let last = self.last_day();
        let end = last + Duration::days(6 - last.weekday().num_days_from_sunday() as i64);

        start.iter_days().take_while(|d| *d <= end).collect()
    }
}

impl fmt::Display for MonthRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for MonthRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Stage entries grouped by day, insertion order preserved within a day.
pub fn bin_predictions(predictions: &[PredictionRecord]) -> BTreeMap<NaiveDate, Vec<PredictionRecord>> {
    let mut bins: BTreeMap<NaiveDate, Vec<PredictionRecord>> = BTreeMap::new();
    for prediction in predictions {
        bins.entry(prediction.stage_date)
            .or_default()
            .push(prediction.clone());
    }
    bins
}

/// The latest reading per display-offset day.
pub fn bin_readings(
    readings: &[SensorReading],
    offset: FixedOffset,
) -> BTreeMap<NaiveDate, SensorReading> {
    let mut bins: BTreeMap<NaiveDate, SensorReading> = BTreeMap::new();
    for reading in readings {
        let day = reading.timestamp.with_timezone(&offset).date_naive();
        match bins.get(&day) {
            Some(existing) if existing.timestamp >= reading.timestamp => {}
            _ => {
                bins.insert(day, reading.clone());
            }
        }
    }
    bins
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub stages: Vec<PredictionRecord>,
    pub reading: Option<SensorReading>,
}

impl CalendarDay {
    pub fn visible_stages(&self) -> &[PredictionRecord] {
        &self.stages[..self.stages.len().min(INLINE_STAGES)]
    }

    pub fn hidden_count(&self) -> usize {
        self.stages.len().saturating_sub(INLINE_STAGES)
    }

    /// "+N more" when stages overflow the inline slots.
    pub fn more_label(&self) -> Option<String> {
        match self.hidden_count() {
            0 => None,
            n => Some(format!("+{} more", n)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub days_with_stages: usize,
    pub total_stages: usize,
    pub optimal_stages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarMonth {
    pub month: MonthRef,
    pub days: Vec<CalendarDay>,
    pub summary: MonthSummary,
}

impl CalendarMonth {
    /// Builds the grid for `month` from the current data set. Output depends
    /// only on the arguments.
    pub fn build(
        month: MonthRef,
        predictions: &[PredictionRecord],
        readings: &[SensorReading],
        offset: FixedOffset,
        today: NaiveDate,
    ) -> Self {
        let mut stage_bins = bin_predictions(predictions);
        let mut reading_bins = bin_readings(readings, offset);

        let summary = summarize(month, &stage_bins);

        let days = month
            .grid_days()
            .into_iter()
            .map(|date| CalendarDay {
                date,
                in_month: month.contains(date),
                is_today: date == today,
                stages: stage_bins.remove(&date).unwrap_or_default(),
                reading: reading_bins.remove(&date),
            })
            .collect();

        Self {
            month,
            days,
            summary,
        }
    }

    /// Full stage list for one grid day.
    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days.iter().find(|d| d.date == date)
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarDay]> {
        self.days.chunks(7)
    }
}

fn summarize(month: MonthRef, bins: &BTreeMap<NaiveDate, Vec<PredictionRecord>>) -> MonthSummary {
    bins.range(month.first_day()..=month.last_day())
        .filter(|(_, stages)| !stages.is_empty())
        .fold(MonthSummary::default(), |mut summary, (_, stages)| {
            summary.days_with_stages += 1;
            summary.total_stages += stages.len();
            summary.optimal_stages += stages
                .iter()
                .filter(|s| s.status == GrowthStatus::Optimal)
                .count();
            summary
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc8() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn stage(d: NaiveDate, name: &str, status: GrowthStatus) -> PredictionRecord {
        let mut record = PredictionRecord::new(d, name);
        record.status = status;
        record
    }

    #[test]
    fn test_grid_covers_whole_weeks() {
        // June 2025: Sun 1st .. Mon 30th
        let june = MonthRef::new(2025, 6).unwrap();
        let days = june.grid_days();
        assert_eq!(days.len() % 7, 0);
        assert_eq!(days.first(), Some(&date(2025, 6, 1)));
        assert_eq!(days.last(), Some(&date(2025, 7, 5)));
        assert_eq!(days[0].weekday(), Weekday::Sun);

        // February 2026 starts on a Sunday and ends on a Saturday
        let feb = MonthRef::new(2026, 2).unwrap();
        assert_eq!(feb.grid_days().len(), 28);

        // March 2025: Sat 1st .. Mon 31st needs six weeks
        let march = MonthRef::new(2025, 3).unwrap();
        let days = march.grid_days();
        assert_eq!(days.len(), 42);
        assert_eq!(days.first(), Some(&date(2025, 2, 23)));
        assert_eq!(days.last(), Some(&date(2025, 4, 5)));
    }

    #[test]
    fn test_navigation() {
        let jan = MonthRef::new(2025, 1).unwrap();
        assert_eq!(jan.prev(), MonthRef::new(2024, 12).unwrap());
        assert_eq!(jan.next().next(), MonthRef::new(2025, 3).unwrap());
        assert_eq!(jan.next().prev(), jan);
        assert_eq!(MonthRef::containing(date(2025, 1, 31)).next().to_string(), "2025-02");
        assert_eq!(MonthRef::new(2024, 2).unwrap().days_in_month(), 29);
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(
            MonthRef::parse("2025-06").unwrap(),
            MonthRef::new(2025, 6).unwrap()
        );
        assert!(MonthRef::parse("2025-13").is_err());
        assert!(MonthRef::parse("June").is_err());
    }

    #[test]
    fn test_bin_readings_keeps_latest_per_day() {
        let early = SensorReading::empty(Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap());
        let late = SensorReading::empty(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
        // 17:00 UTC on June 1 is June 2 at UTC+8
        let next_day = SensorReading::empty(Utc.with_ymd_and_hms(2025, 6, 1, 17, 0, 0).unwrap());

        let bins = bin_readings(&[early, late.clone(), next_day.clone()], utc8());
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[&date(2025, 6, 1)], late);
        assert_eq!(bins[&date(2025, 6, 2)], next_day);
    }

    #[test]
    fn test_day_overflow_and_detail() {
        let d = date(2025, 6, 12);
        let predictions = vec![
            stage(d, "Batch A Vegetative", GrowthStatus::Normal),
            stage(d, "Batch B Seedling", GrowthStatus::Optimal),
            stage(d, "Batch C Harvesting", GrowthStatus::Warning),
            stage(d, "Batch D Seedling", GrowthStatus::Normal),
        ];
        let month = CalendarMonth::build(
            MonthRef::new(2025, 6).unwrap(),
            &predictions,
            &[],
            utc8(),
            date(2025, 6, 12),
        );

        let day = month.day(d).unwrap();
        assert!(day.is_today);
        assert_eq!(day.visible_stages().len(), 2);
        assert_eq!(day.visible_stages()[0].stage_name, "Batch A Vegetative");
        assert_eq!(day.hidden_count(), 2);
        assert_eq!(day.more_label().as_deref(), Some("+2 more"));
        assert_eq!(day.stages.len(), 4);
        assert_eq!(day.stages[3].stage_name, "Batch D Seedling");
    }

    #[test]
    fn test_summary_ignores_padding_days() {
        let predictions = vec![
            stage(date(2025, 5, 31), "Padding", GrowthStatus::Optimal),
            stage(date(2025, 6, 1), "Seedling", GrowthStatus::Optimal),
            stage(date(2025, 6, 1), "Seedling B", GrowthStatus::Normal),
            stage(date(2025, 6, 20), "Vegetative", GrowthStatus::Optimal),
            stage(date(2025, 7, 2), "Padding", GrowthStatus::Optimal),
        ];
        let month = CalendarMonth::build(
            MonthRef::new(2025, 6).unwrap(),
            &predictions,
            &[],
            utc8(),
            date(2025, 6, 1),
        );

        assert_eq!(
            month.summary,
            MonthSummary {
                days_with_stages: 2,
                total_stages: 3,
                optimal_stages: 2,
            }
        );
        // padding day still displays its entry
        let padding = month.day(date(2025, 7, 2)).unwrap();
        assert!(!padding.in_month);
        assert_eq!(padding.stages.len(), 1);
    }

    #[test]
    fn test_days_with_stages_bounded_by_month_length() {
        let feb = MonthRef::new(2025, 2).unwrap();
        let predictions: Vec<_> = feb
            .grid_days()
            .into_iter()
            .flat_map(|d| vec![stage(d, "x", GrowthStatus::Normal), stage(d, "y", GrowthStatus::Normal)])
            .collect();
        let month = CalendarMonth::build(feb, &predictions, &[], utc8(), date(2025, 2, 1));
        assert!(month.summary.days_with_stages <= feb.days_in_month() as usize);
        assert_eq!(month.summary.days_with_stages, 28);
        assert_eq!(month.summary.total_stages, 56);
    }

    #[test]
    fn test_build_is_deterministic_across_navigation() {
        let predictions = vec![stage(date(2025, 6, 3), "Seedling", GrowthStatus::Normal)];
        let june = MonthRef::new(2025, 6).unwrap();
        let direct = CalendarMonth::build(june, &predictions, &[], utc8(), date(2025, 6, 3));
        let navigated = CalendarMonth::build(june.next().prev(), &predictions, &[], utc8(), date(2025, 6, 3));
        assert_eq!(direct.days.len(), navigated.days.len());
        assert_eq!(direct.summary, navigated.summary);
        assert_eq!(direct.weeks().count(), 5);
    }
}

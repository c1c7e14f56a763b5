//! Page view-models built from a [`Snapshot`].
//!
//! Each builder is a pure function of the snapshot, the current instant and
//! the display offset. Missing data renders as "N/A" or an empty list.

use crate::dashboard::advisor::{
    assess, default_rules, pump_status, recommendations, Advisory, ChannelAssessment, PumpState,
};
use crate::dashboard::calendar::{CalendarMonth, MonthRef, MonthSummary};
use crate::dashboard::hourly::{chart_bins, TrendSeries};
use crate::dashboard::models::{
    format_value, Channel, GrowthStatus, PredictionRecord, SensorReading, NOT_AVAILABLE,
    UNKNOWN_STAGE,
};
use crate::dashboard::poller::Snapshot;
use crate::dashboard::selector::{batch_start, growth_day, latest_prediction, latest_sensor, today_in};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

/// Rows in the "recent readings" table.
pub const RECENT_ROWS: usize = 5;

/// Channels shown as cards on the lettuce page.
pub const OVERVIEW_CHANNELS: [Channel; 6] = [
    Channel::AirTemperature,
    Channel::Humidity,
    Channel::Lux,
    Channel::Ppfd,
    Channel::Reflect445,
    Channel::Reflect480,
];

const TANK_CHANNELS: [Channel; 3] = [Channel::Tds, Channel::Ph, Channel::WaterTemperature];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorCard {
    pub channel: Channel,
    pub label: &'static str,
    pub value: Option<f64>,
    pub display: String,
}

impl SensorCard {
    fn new(channel: Channel, reading: Option<&SensorReading>) -> Self {
        let value = reading.and_then(|r| r.value(channel));
        Self {
            channel,
            label: channel.label(),
            value,
            display: format_value(value, channel.unit()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage_name: String,
    pub stage_date: Option<NaiveDate>,
    pub yield_display: String,
    pub status: GrowthStatus,
    pub notes: Option<String>,
}

impl StageSummary {
    fn new(prediction: Option<&PredictionRecord>) -> Self {
        match prediction {
            Some(p) => Self {
                stage_name: p.stage_name.clone(),
                stage_date: Some(p.stage_date),
                yield_display: yield_display(p),
                status: p.status,
                notes: p.notes.clone(),
            },
            None => Self {
                stage_name: UNKNOWN_STAGE.to_string(),
                stage_date: None,
                yield_display: NOT_AVAILABLE.to_string(),
                status: GrowthStatus::Normal,
                notes: None,
            },
        }
    }
}

fn yield_display(prediction: &PredictionRecord) -> String {
    prediction
        .rounded_yield()
        .map(|y| y.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRow {
    pub time: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub stage_date: NaiveDate,
    pub stage_name: String,
    pub yield_display: String,
    pub status: GrowthStatus,
    pub is_current: bool,
    pub is_future: bool,
}

/// The lettuce monitoring page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LettuceOverview {
    pub updated_at: String,
    pub cards: Vec<SensorCard>,
    pub current_stage: StageSummary,
    pub batch_start: Option<NaiveDate>,
    pub growth_day: Option<i64>,
    pub trend: TrendSeries,
    pub recent: Vec<RecentRow>,
    pub timeline: Vec<TimelineEntry>,
    pub banner: Option<String>,
}

impl LettuceOverview {
    pub fn build(
        snapshot: &Snapshot,
        channel: Channel,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let today = today_in(now, offset);
        let latest = latest_sensor(&snapshot.readings);
        let current = latest_prediction(&snapshot.predictions, today);

        let recent = snapshot
            .readings
            .iter()
            .take(RECENT_ROWS)
            .map(|r| RecentRow {
                time: local_time(r.timestamp, offset),
                values: OVERVIEW_CHANNELS
                    .iter()
                    .map(|c| format_value(r.value(*c), c.unit()))
                    .collect(),
            })
            .collect();

        let timeline = snapshot
            .predictions
            .iter()
            .map(|p| TimelineEntry {
                stage_date: p.stage_date,
                stage_name: p.stage_name.clone(),
                yield_display: yield_display(p),
                status: p.status,
                is_current: current.is_some_and(|c| std::ptr::eq(c, p)),
                is_future: p.stage_date > today,
            })
            .collect();

        Self {
            updated_at: updated_at(latest, offset),
            cards: OVERVIEW_CHANNELS
                .iter()
                .map(|c| SensorCard::new(*c, latest))
                .collect(),
            current_stage: StageSummary::new(current),
            batch_start: batch_start(&snapshot.predictions),
            growth_day: growth_day(&snapshot.predictions, today),
            trend: TrendSeries::from_bins(channel, &chart_bins(&trend_source(snapshot), now, offset)),
            recent,
            timeline,
            banner: snapshot.banner.clone(),
        }
    }
}

/// The water-tank page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterTankView {
    pub updated_at: String,
    pub channels: Vec<ChannelAssessment>,
    pub advisories: Vec<Advisory>,
    pub pump: PumpState,
    pub trends: Vec<TrendSeries>,
    pub banner: Option<String>,
}

impl WaterTankView {
    pub fn build(snapshot: &Snapshot, now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let rules = default_rules();
        let latest = latest_sensor(&snapshot.readings);
        let bins = chart_bins(&trend_source(snapshot), now, offset);

        Self {
            updated_at: updated_at(latest, offset),
            channels: rules.iter().map(|rule| assess(rule, latest)).collect(),
            advisories: recommendations(latest, &rules),
            pump: pump_status(latest, now, offset),
            trends: TANK_CHANNELS
                .iter()
                .map(|c| TrendSeries::from_bins(*c, &bins))
                .collect(),
            banner: snapshot.banner.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagePreview {
    pub stage_name: String,
    pub status: GrowthStatus,
    pub yield_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub day: u32,
    pub in_month: bool,
    pub is_today: bool,
    pub stages: Vec<StagePreview>,
    pub more: Option<String>,
    pub has_reading: bool,
}

/// The growth calendar page for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarView {
    pub month: MonthRef,
    pub title: String,
    pub prev: MonthRef,
    pub next: MonthRef,
    pub today: MonthRef,
    pub weeks: Vec<Vec<CalendarCell>>,
    pub summary: MonthSummary,
    pub banner: Option<String>,
}

impl CalendarView {
    pub fn build(
        snapshot: &Snapshot,
        month: MonthRef,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let today = today_in(now, offset);
        let calendar = CalendarMonth::build(
            month,
            &snapshot.predictions,
            &all_readings(snapshot),
            offset,
            today,
        );

        let weeks = calendar
            .weeks()
            .map(|week| {
                week.iter()
                    .map(|day| CalendarCell {
                        date: day.date,
                        day: day.date.day(),
                        in_month: day.in_month,
                        is_today: day.is_today,
                        stages: day
                            .visible_stages()
                            .iter()
                            .map(|p| StagePreview {
                                stage_name: p.stage_name.clone(),
                                status: p.status,
                                yield_display: yield_display(p),
                            })
                            .collect(),
                        more: day.more_label(),
                        has_reading: day.reading.is_some(),
                    })
                    .collect()
            })
            .collect();

        Self {
            month,
            title: month.first_day().format("%B %Y").to_string(),
            prev: month.prev(),
            next: month.next(),
            today: MonthRef::containing(today),
            weeks,
            summary: calendar.summary,
            banner: snapshot.banner.clone(),
        }
    }
}

/// Click-through detail for one calendar day: every stage, no truncation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayDetail {
    pub date: NaiveDate,
    pub title: String,
    pub stages: Vec<PredictionRecord>,
    pub reading_time: Option<String>,
    pub cards: Vec<SensorCard>,
}

impl DayDetail {
    pub fn build(
        snapshot: &Snapshot,
        date: NaiveDate,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let calendar = CalendarMonth::build(
            MonthRef::containing(date),
            &snapshot.predictions,
            &all_readings(snapshot),
            offset,
            today_in(now, offset),
        );
        let day = calendar.day(date);
        let reading = day.and_then(|d| d.reading.as_ref());

        Self {
            date,
            title: date.format("%A, %B %-d, %Y").to_string(),
            stages: day.map(|d| d.stages.clone()).unwrap_or_default(),
            reading_time: reading.map(|r| local_time(r.timestamp, offset)),
            cards: Channel::ALL
                .iter()
                .map(|c| SensorCard::new(*c, reading))
                .collect(),
        }
    }
}

/// Latest readings plus history, for views that look further back than the
/// latest-readings window.
fn all_readings(snapshot: &Snapshot) -> Vec<SensorReading> {
    let mut readings = snapshot.readings.clone();
    readings.extend(snapshot.history.iter().cloned());
    readings
}

fn trend_source(snapshot: &Snapshot) -> Vec<SensorReading> {
    if snapshot.history.is_empty() {
        snapshot.readings.clone()
    } else {
        all_readings(snapshot)
    }
}

fn local_time(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format(TIME_FORMAT).to_string()
}

fn updated_at(latest: Option<&SensorReading>, offset: FixedOffset) -> String {
    latest
        .map(|r| local_time(r.timestamp, offset))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::advisor::Severity;
    use chrono::{Duration, TimeZone};

    fn utc8() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        // 2025-06-05 12:00 at UTC+8
        Utc.with_ymd_and_hms(2025, 6, 5, 4, 0, 0).unwrap()
    }

    fn snapshot() -> Snapshot {
        let readings: Vec<SensorReading> = (0..8)
            .map(|h| {
                let mut r = SensorReading::empty(now() - Duration::hours(h));
                r.temp_envi = Some(22.0 + h as f64);
                r.tds = Some(900.0);
                r.ph = Some(6.1);
                r.temp_water = Some(24.0);
                r
            })
            .collect();

        let mut seedling = PredictionRecord::new(date(2025, 6, 1), "Seedling");
        seedling.yield_predicted = Some(11.6);
        seedling.batch_start = Some(date(2025, 6, 1));
        let mut harvest = PredictionRecord::new(date(2025, 6, 10), "Harvest");
        harvest.status = GrowthStatus::Optimal;

        Snapshot {
            readings,
            predictions: vec![seedling, harvest],
            generation: 1,
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_overview_current_stage_and_recent() {
        let view = LettuceOverview::build(&snapshot(), Channel::AirTemperature, now(), utc8());

        assert_eq!(view.current_stage.stage_name, "Seedling");
        assert_eq!(view.current_stage.yield_display, "12");
        assert_eq!(view.growth_day, Some(5));
        assert_eq!(view.recent.len(), RECENT_ROWS);
        assert_eq!(view.recent[0].time, "2025-06-05 12:00:00");
        assert_eq!(view.cards[0].display, "22.00 °C");
        assert_eq!(view.trend.values.len(), 8);

        let current: Vec<_> = view.timeline.iter().filter(|t| t.is_current).collect();
        assert_eq!(current.len(), 1);
        assert!(view.timeline[1].is_future);
    }

    #[test]
    fn test_overview_without_data_shows_not_available() {
        let view = LettuceOverview::build(&Snapshot::default(), Channel::Ph, now(), utc8());
        assert_eq!(view.updated_at, NOT_AVAILABLE);
        assert!(view.cards.iter().all(|c| c.display == NOT_AVAILABLE));
        assert_eq!(view.current_stage.stage_name, UNKNOWN_STAGE);
        assert!(view.recent.is_empty());
        assert!(view.trend.values.is_empty());
    }

    #[test]
    fn test_water_tank_flags_high_tds() {
        let view = WaterTankView::build(&snapshot(), now(), utc8());
        assert_eq!(view.advisories.len(), 1);
        assert_eq!(view.advisories[0].severity, Severity::Critical);
        assert_eq!(view.channels.len(), 3);
        assert_eq!(view.pump, PumpState::On);
        assert_eq!(view.trends.len(), 3);
    }

    #[test]
    fn test_calendar_view_grid() {
        let view = CalendarView::build(
            &snapshot(),
            MonthRef::new(2025, 6).unwrap(),
            now(),
            utc8(),
        );
        assert_eq!(view.title, "June 2025");
        assert!(view.weeks.iter().all(|w| w.len() == 7));
        assert_eq!(view.summary.days_with_stages, 2);
        assert_eq!(view.summary.optimal_stages, 1);

        let today: Vec<_> = view.weeks.iter().flatten().filter(|c| c.is_today).collect();
        assert_eq!(today.len(), 1);
        assert!(today[0].has_reading);
        assert_eq!(view.next, MonthRef::new(2025, 7).unwrap());
    }

    #[test]
    fn test_day_detail_lists_every_stage() {
        let mut snap = snapshot();
        for name in ["A", "B", "C"] {
            snap.predictions
                .push(PredictionRecord::new(date(2025, 6, 1), name));
        }
        let detail = DayDetail::build(&snap, date(2025, 6, 1), now(), utc8());
        assert_eq!(detail.stages.len(), 4);
        assert_eq!(detail.title, "Sunday, June 1, 2025");
        assert!(detail.reading_time.is_none());
        assert_eq!(detail.cards.len(), Channel::ALL.len());
    }
}

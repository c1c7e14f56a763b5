use crate::dashboard::calendar::MonthRef;
use crate::dashboard::models::Channel;
use crate::dashboard::normalizer::parse_date;
use crate::dashboard::selector::today_in;
use crate::dashboard::view::{CalendarView, DayDetail, LettuceOverview, WaterTankView};
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub channel: Option<String>,
}

/// `GET /api/dashboard/overview?channel=temp_envi`
pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<LettuceOverview>> {
    let channel = match query.channel.as_deref() {
        None | Some("") => Channel::AirTemperature,
        Some(key) => Channel::from_key(key)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown channel '{}'", key)))?,
    };

    let snapshot = state.dashboard.snapshot();
    Ok(Json(LettuceOverview::build(
        &snapshot,
        channel,
        Utc::now(),
        state.offset(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<String>,
}

/// `GET /api/dashboard/calendar?month=YYYY-MM`, defaulting to the current month.
pub async fn calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarView>> {
    let now = Utc::now();
    let month = match query.month.as_deref() {
        None | Some("") => MonthRef::containing(today_in(now, state.offset())),
        Some(raw) => MonthRef::parse(raw)?,
    };

    let snapshot = state.dashboard.snapshot();
    Ok(Json(CalendarView::build(&snapshot, month, now, state.offset())))
}

/// `GET /api/dashboard/calendar/day/{date}`
pub async fn calendar_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayDetail>> {
    let date = parse_date(&date, state.offset())
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{}'", date)))?;

    let snapshot = state.dashboard.snapshot();
    Ok(Json(DayDetail::build(
        &snapshot,
        date,
        Utc::now(),
        state.offset(),
    )))
}

/// `GET /api/dashboard/water-tank`
pub async fn water_tank(State(state): State<AppState>) -> Json<WaterTankView> {
    let snapshot = state.dashboard.snapshot();
    Json(WaterTankView::build(&snapshot, Utc::now(), state.offset()))
}

/// `POST /api/dashboard/refresh`: the banner's retry control.
pub async fn refresh(State(state): State<AppState>) -> StatusCode {
    state.dashboard.refresh_now();
    StatusCode::ACCEPTED
}

/// `DELETE /api/dashboard/banner`: the banner's close control.
pub async fn dismiss_banner(State(state): State<AppState>) -> StatusCode {
    state.dashboard.dismiss_banner();
    StatusCode::NO_CONTENT
}

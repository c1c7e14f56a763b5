use crate::db::models::SensorRow;
use crate::error::Result;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::{Duration, Utc};

/// `GET /api/sensors-data`: latest readings, newest first.
pub async fn latest_readings(State(state): State<AppState>) -> Result<Json<Vec<SensorRow>>> {
    let rows = state
        .repository
        .latest_sensor_readings(state.config.database.sensor_limit)
        .await?;
    Ok(Json(rows))
}

/// `GET /api/sensors-data/history`: the trailing window, oldest first.
pub async fn history(State(state): State<AppState>) -> Result<Json<Vec<SensorRow>>> {
    let window = Duration::hours(i64::from(state.config.database.history_hours));
    let since = (Utc::now() - window)
        .with_timezone(&state.offset())
        .naive_local();

    let rows = state.repository.sensor_history(since).await?;
    Ok(Json(rows))
}

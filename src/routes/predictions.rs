use crate::dashboard::selector::today_in;
use crate::db::models::PredictionPayload;
use crate::error::Result;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;

/// `GET /api/prediction-data`: every forecast row, earliest stage first.
///
/// Past stages are included so the dashboard can find the current one.
pub async fn predictions(State(state): State<AppState>) -> Result<Json<Vec<PredictionPayload>>> {
    let today = today_in(Utc::now(), state.offset())
        .format("%Y-%m-%d")
        .to_string();

    let payload = state
        .repository
        .predictions()
        .await?
        .into_iter()
        .map(|row| row.into_payload(&today))
        .collect();

    Ok(Json(payload))
}

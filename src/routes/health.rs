use axum::Json;
use serde_json::{json, Value};

/// Liveness probe. Does not touch the databases.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

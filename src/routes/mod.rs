mod auth;
mod dashboard;
mod health;
mod predictions;
mod sensors;

use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub use auth::BCRYPT_COST;

pub fn build_router(state: AppState) -> Router {
    let data_routes = Router::new()
        .route("/sensors-data", get(sensors::latest_readings))
        .route("/sensors-data/history", get(sensors::history))
        .route("/prediction-data", get(predictions::predictions));

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/profile", put(auth::update_profile))
        .route("/change-password", post(auth::change_password));

    let dashboard_routes = Router::new()
        .route("/overview", get(dashboard::overview))
        .route("/calendar", get(dashboard::calendar))
        .route("/calendar/day/{date}", get(dashboard::calendar_day))
        .route("/water-tank", get(dashboard::water_tank))
        .route("/refresh", post(dashboard::refresh))
        .route("/banner", delete(dashboard::dismiss_banner));

    let api_routes = Router::new()
        .merge(data_routes)
        .merge(auth_routes)
        .nest("/dashboard", dashboard_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Active direct-processing alerts for banner/toast rendering.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use super::AppState;
use crate::alerts::ActiveAlert;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/alerts", get(active_alerts))
}

async fn active_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<ActiveAlert>> {
    Json(state.engine.active_alerts())
}

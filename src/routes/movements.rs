//! Movement ledger endpoints: list the journal, record receptions.

use std::sync::Arc;

use axum::{
    extract::Query, extract::State, http::StatusCode, response::IntoResponse, routing::get, Json,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::models::{MovementRecord, NewMovement, Tank};

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/movements", get(list_movements).post(record_reception))
}

/// Query parameters for filtering ledger movements.
#[derive(Debug, Deserialize)]
pub struct MovementsQuery {
    tank: Option<String>,
    supplier: Option<String>,
    limit: Option<u32>,
}

async fn list_movements(
    Query(params): Query<MovementsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // ---
    let snapshot = state.ledger.snapshot();
    let tank_filter = params.tank.clone().map(Tank::from);

    let movements: Vec<MovementRecord> = snapshot
        .iter()
        .filter(|r| tank_filter.as_ref().map_or(true, |t| &r.tank == t))
        .filter(|r| {
            params
                .supplier
                .as_ref()
                .map_or(true, |s| &r.supplier_name == s)
        })
        .take(params.limit.unwrap_or(1000) as usize)
        .cloned()
        .collect();

    info!("GET /movements - returning {} records", movements.len());
    (StatusCode::OK, Json(movements))
}

/// Request body for recording a milk reception.
#[derive(Debug, Deserialize)]
struct ReceptionRequest {
    tank: String,
    milk_volume: f64,
    supplier_name: String,
    quality_score: Option<String>,
    temperature: Option<f64>,
    destination: Option<String>,
}

async fn record_reception(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReceptionRequest>,
) -> impl IntoResponse {
    // ---
    if !(req.milk_volume > 0.0 && req.milk_volume.is_finite()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "milk_volume must be a positive number of liters" })),
        )
            .into_response();
    }
    if req.supplier_name.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "supplier_name must not be empty" })),
        )
            .into_response();
    }

    let movement = NewMovement {
        tank: Tank::from(req.tank),
        volume_liters: req.milk_volume,
        supplier_name: req.supplier_name,
        quality_grade: req.quality_score,
        temperature_c: req.temperature,
        destination: req.destination,
    };

    if let Err(err) = state.ledger.store().insert_movement(movement).await {
        error!("failed to record reception: {err}");
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "failed to record reception" })),
        )
            .into_response();
    }

    // Wake the alert engine and balance readers; stale view on failure.
    if let Err(err) = state.ledger.refetch().await {
        error!("ledger refetch after reception failed: {err}");
    }

    (StatusCode::CREATED, Json(json!({ "status": "recorded" }))).into_response()
}

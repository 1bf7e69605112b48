//! Offload submission endpoint.
//!
//! Maps the coordinator's structured validation errors onto HTTP: 422 for
//! client-side rejections (with the suggested alternative tank when one
//! exists), 502 for store failures.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::AppState;
use crate::error::TankSuggestion;
use crate::models::Tank;
use crate::offload::OffloadForm;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/offloads", post(submit_offload))
}

#[derive(Debug, Deserialize)]
struct OffloadRequest {
    storage_tank: String,
    milk_volume: f64,
    temperature: Option<f64>,
    quality_check: Option<String>,
    destination: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct OffloadResponse {
    batch_id: String,
    storage_tank: Tank,
    volume_liters: f64,
}

#[derive(Debug, Serialize)]
struct OffloadRejection {
    error: String,
    suggested_tank: Option<TankSuggestion>,
}

async fn submit_offload(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OffloadRequest>,
) -> impl IntoResponse {
    // ---
    let mut form = OffloadForm::new();
    state
        .coordinator
        .select_tank(&mut form, Tank::from(req.storage_tank));

    // Request fields override the prefill where supplied.
    form.milk_volume = Some(req.milk_volume);
    if req.temperature.is_some() {
        form.temperature_c = req.temperature;
    }
    if req.quality_check.is_some() {
        form.quality_check = req.quality_check;
    }
    if req.destination.is_some() {
        form.destination = req.destination;
    }
    form.notes = req.notes;

    match state.coordinator.submit(&mut form).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(OffloadResponse {
                batch_id: receipt.batch_id,
                storage_tank: receipt.tank,
                volume_liters: receipt.volume_liters,
            }),
        )
            .into_response(),
        Err(err) if err.is_validation() => {
            let rejection = OffloadRejection {
                error: err.to_string(),
                suggested_tank: err.suggested_alternative().cloned(),
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(rejection)).into_response()
        }
        Err(err) => {
            error!("offload submission failed: {err}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

//! Per-tank volume and capacity figures for display.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;
use crate::balance;
use crate::models::Tank;

// ---

pub fn router() -> Router<Arc<AppState>> {
    // ---
    Router::new().route("/tanks", get(tank_status))
}

#[derive(Debug, Serialize)]
struct TankStatus {
    tank: Tank,
    available_liters: f64,
    capacity_liters: Option<f64>,
    capacity_remaining_liters: Option<f64>,
}

async fn tank_status(State(state): State<Arc<AppState>>) -> Json<Vec<TankStatus>> {
    // ---
    let snapshot = state.ledger.snapshot();

    let statuses = [Tank::StorageA, Tank::StorageB, Tank::DirectProcessing]
        .into_iter()
        .map(|tank| TankStatus {
            available_liters: balance::available_volume(&snapshot, &tank),
            capacity_liters: balance::tank_capacity(&tank),
            capacity_remaining_liters: balance::capacity_remaining(&snapshot, &tank),
            tank,
        })
        .collect();

    Json(statuses)
}

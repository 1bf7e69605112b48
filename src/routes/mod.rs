use std::sync::Arc;

use axum::Router;

use crate::alerts::AlertEngine;
use crate::ledger::Ledger;
use crate::offload::OffloadCoordinator;

mod alerts;
mod health;
mod movements;
mod offloads;
mod tanks;

// ---

/// Shared state for every route handler.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub engine: Arc<AlertEngine>,
    pub coordinator: OffloadCoordinator,
}

pub fn router(state: Arc<AppState>) -> Router {
    // ---
    Router::new()
        .merge(movements::router())
        .merge(tanks::router())
        .merge(alerts::router())
        .merge(offloads::router())
        .merge(health::router())
        .with_state(state)
}

// src/routes/health.rs
//! API health check endpoint.
//!
//! Defines the `/health` route used by container orchestrators and CI
//! pipelines to verify that the service is running and able to respond to
//! HTTP requests. The gateway (`mod.rs`) merges this subrouter into the
//! top-level API router.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
///
/// Returns a static JSON object indicating the API is reachable. This
/// endpoint is deliberately lightweight and does not touch the database or
/// the alert engine.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Create a subrouter containing the `/health` route.
///
/// Generic over the application state so it merges cleanly with the
/// gateway router regardless of the state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}

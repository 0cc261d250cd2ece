//! Axum router construction.

use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, state::AppState};
use crate::auth::admission_gate;

/// Upper bound on handling one request, gate included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application [`Router`]: `downstream` domain routes plus the
/// mediator's own, all behind the admission gate.
pub fn build(state: AppState, downstream: Router<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(downstream)
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admission_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}

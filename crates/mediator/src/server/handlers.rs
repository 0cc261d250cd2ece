//! Axum request handlers owned by the mediator itself.
//!
//! Domain routes are mounted by the caller of
//! [`router::build`](super::router::build); the handlers here only report on
//! the mediator's own state.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{ErrorResponse, HealthResponse};

use super::state::AppState;
use crate::config::URN_KEY;

/// `GET /health`: reports the registered URN and config version.
pub async fn health(State(state): State<AppState>) -> Response {
    let snapshot = state.config.snapshot();
    let body = HealthResponse {
        status: "ok".into(),
        urn: snapshot.get_str(URN_KEY).map(str::to_owned),
        config_version: snapshot.version(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use axum::{body::Body, http::Request, routing::get, Router};
    use serde_json::json;
    use tower::ServiceExt;

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health))
            .with_state(state)
    }

    #[tokio::test]
    async fn health_reports_unregistered_state() {
        let app = test_router(AppState::default());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.urn, None);
        assert_eq!(body.config_version, 0);
    }

    #[tokio::test]
    async fn health_reports_urn_after_stamp() {
        let store = ConfigStore::new(json!({}).as_object().cloned().unwrap());
        store.stamp_urn("urn:mediator:cr");
        let app = test_router(AppState::new(store));
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.urn.as_deref(), Some("urn:mediator:cr"));
        assert_eq!(body.config_version, 1);
    }
}

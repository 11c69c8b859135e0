use axum::response::{IntoResponse, Response};

use crate::responses::JsonResponse;

/// Liveness probe. Answers without touching the backend.
pub async fn health_check() -> Response {
    JsonResponse::success("ok").into_response()
}

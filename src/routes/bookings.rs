use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use serde_json::json;
use tracing::error;

use crate::models::booking::{BookingStatus, NewBooking};
use crate::responses::JsonResponse;
use crate::routes::account::resolve_caller;
use crate::state::AppState;

/// Reserves a spot at a catalog event for the caller. The reservation is
/// stored as `pending` and reviewed by staff out of band.
pub async fn create_booking(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(payload): Json<NewBooking>,
) -> Response {
    let caller = match resolve_caller(&state, bearer.as_ref()).await {
        Ok((caller, _)) => caller,
        Err(response) => return response,
    };

    if payload.guests < 1 {
        return JsonResponse::bad_request("At least one guest is required").into_response();
    }

    let row = json!({
        "event_id": payload.event_id,
        "user_id": caller.id,
        "name": payload.name,
        "email": payload.email,
        "phone": payload.phone,
        "guests": payload.guests,
        "status": BookingStatus::Pending,
    });

    if let Err(err) = state.store.insert("bookings", row).await {
        error!(?err, user_id = %caller.id, event_id = payload.event_id, "failed to save booking");
        return JsonResponse::server_error("Failed to save booking").into_response();
    }

    JsonResponse::success("Booking request received").into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::Request,
        http::StatusCode,
        routing::post,
        Router,
    };
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        config::Config,
        deletion::DeletionWorkflow,
        models::user::AuthUser,
        services::supabase::MockBackend,
        state::AppState,
    };

    use super::create_booking;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            supabase_url: "http://localhost".into(),
            supabase_anon_key: "anon".into(),
            supabase_service_role_key: "service".into(),
            frontend_origin: "http://localhost".into(),
        })
    }

    fn build_app(backend: MockBackend) -> Router {
        let backend = Arc::new(backend);
        let state = AppState {
            store: backend.clone(),
            auth: backend.clone(),
            deletion: Arc::new(DeletionWorkflow::new(backend.clone(), backend.clone())),
            config: test_config(),
        };

        Router::new()
            .route("/bookings", post(create_booking))
            .with_state(state)
    }

    fn test_user(id: Uuid) -> AuthUser {
        serde_json::from_value(json!({ "id": id.to_string(), "email": "user@example.com" }))
            .unwrap()
    }

    fn booking_request(token: Option<&str>, guests: i32) -> Request<Body> {
        let mut builder = Request::post("/bookings").header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
            .body(Body::from(
                serde_json::to_vec(&json!({
                    "event_id": 42,
                    "name": "Dana Field",
                    "email": "user@example.com",
                    "phone": null,
                    "guests": guests,
                }))
                .unwrap(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_booking_stamps_owner_and_pending_status() {
        let user_id = Uuid::new_v4();
        let backend = MockBackend::new()
            .with_user(test_user(user_id))
            .with_token("token-abc", user_id);

        let app = build_app(backend.clone());
        let res = app
            .oneshot(booking_request(Some("token-abc"), 2))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let stored = backend.rows("bookings");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["user_id"], user_id.to_string());
        assert_eq!(stored[0]["event_id"], 42);
        assert_eq!(stored[0]["status"], "pending");
    }

    #[tokio::test]
    async fn test_create_booking_requires_token() {
        let app = build_app(MockBackend::new());
        let res = app.oneshot(booking_request(None, 2)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_booking_rejects_zero_guests() {
        let user_id = Uuid::new_v4();
        let backend = MockBackend::new()
            .with_user(test_user(user_id))
            .with_token("token-abc", user_id);

        let app = build_app(backend.clone());
        let res = app
            .oneshot(booking_request(Some("token-abc"), 0))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(backend.rows("bookings").is_empty());
    }

    #[tokio::test]
    async fn test_create_booking_store_failure() {
        let user_id = Uuid::new_v4();
        let backend = MockBackend::new()
            .with_user(test_user(user_id))
            .with_token("token-abc", user_id);
        backend.fail_table("bookings");

        let app = build_app(backend);
        let res = app
            .oneshot(booking_request(Some("token-abc"), 2))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

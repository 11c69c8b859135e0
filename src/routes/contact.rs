use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::models::contact::NewContactMessage;
use crate::responses::JsonResponse;
use crate::state::AppState;

/// Stores an inbound inquiry. New rows always start unanswered.
pub async fn handle_contact(
    State(state): State<AppState>,
    Json(payload): Json<NewContactMessage>,
) -> Response {
    let name = payload.name.trim();
    let email = payload.email.trim();
    let subject = payload.subject.trim();
    let message = payload.message.trim();
    if name.is_empty() || email.is_empty() || subject.is_empty() || message.is_empty() {
        return JsonResponse::bad_request("All fields are required").into_response();
    }

    let row = json!({
        "name": name,
        "email": email,
        "subject": subject,
        "message": message,
        "responded": false,
    });

    match state.store.insert("contacts", row).await {
        Ok(()) => {
            JsonResponse::success("Thanks for reaching out. We'll get back to you soon.")
                .into_response()
        }
        Err(err) => {
            error!(?err, "failed to store contact message");
            JsonResponse::server_error("Something went wrong").into_response()
        }
    }
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

    use crate::{
        config::Config,
        deletion::DeletionWorkflow,
        services::supabase::MockBackend,
        state::AppState,
    };

    use super::handle_contact;

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
            .route("/contact", post(handle_contact))
            .with_state(state)
    }

    fn contact_request(body: serde_json::Value) -> Request<Body> {
        Request::post("/contact")
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_contact_stores_unanswered_message() {
        let backend = MockBackend::new();
        let app = build_app(backend.clone());

        let res = app
            .oneshot(contact_request(json!({
                "name": "Jordan",
                "email": "jordan@example.com",
                "subject": "Catering",
                "message": "Do you handle vegan menus?",
            })))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let rows = backend.rows("contacts");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["email"], "jordan@example.com");
        assert_eq!(rows[0]["responded"], false);
    }

    #[tokio::test]
    async fn test_contact_rejects_blank_fields() {
        let app = build_app(MockBackend::new());
        let res = app
            .oneshot(contact_request(json!({
                "name": "Jordan",
                "email": " ",
                "subject": "Catering",
                "message": "hi",
            })))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_contact_store_failure() {
        let backend = MockBackend::new();
        backend.fail_table("contacts");

        let app = build_app(backend);
        let res = app
            .oneshot(contact_request(json!({
                "name": "Jordan",
                "email": "jordan@example.com",
                "subject": "Catering",
                "message": "Do you handle vegan menus?",
            })))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use axum::{
    extract::{Json, Path, State},
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use serde_json::json;
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use crate::models::registration::{
    EventRegistration, NewRegistration, PaymentStatus, RegistrationStatus,
};
use crate::responses::JsonResponse;
use crate::routes::account::resolve_caller;
use crate::services::supabase::{Filter, Order};
use crate::state::AppState;

/// Lists the caller's own registrations, newest first.
pub async fn list_registrations(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let caller = match resolve_caller(&state, bearer.as_ref()).await {
        Ok((caller, _)) => caller,
        Err(response) => return response,
    };

    let rows = match state
        .store
        .select(
            "event_registrations",
            &[Filter::eq("user_id", caller.id)],
            Some(Order::desc("created_at")),
            None,
        )
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, user_id = %caller.id, "failed to load registrations");
            return JsonResponse::server_error("Failed to load registrations").into_response();
        }
    };

    let registrations: Vec<EventRegistration> = match rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
    {
        Ok(registrations) => registrations,
        Err(err) => {
            error!(?err, user_id = %caller.id, "registration row failed to decode");
            return JsonResponse::server_error("Failed to load registrations").into_response();
        }
    };

    Json(json!({ "success": true, "registrations": registrations })).into_response()
}

/// Creates a registration owned by the caller. Payment and workflow status
/// always start at `pending` / `submitted`.
pub async fn create_registration(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Json(payload): Json<NewRegistration>,
) -> Response {
    let caller = match resolve_caller(&state, bearer.as_ref()).await {
        Ok((caller, _)) => caller,
        Err(response) => return response,
    };

    let registration = EventRegistration {
        id: Uuid::new_v4(),
        user_id: caller.id,
        event_type: payload.event_type,
        event_date: payload.event_date,
        guest_count: payload.guest_count,
        location: payload.location,
        budget: payload.budget,
        special_requests: payload.special_requests,
        contact_phone: payload.contact_phone,
        contact_email: payload.contact_email,
        payment_status: PaymentStatus::Pending,
        status: RegistrationStatus::Submitted,
        start_time: payload.start_time,
        end_time: payload.end_time,
        created_at: OffsetDateTime::now_utc(),
    };

    let row = match serde_json::to_value(&registration) {
        Ok(row) => row,
        Err(err) => {
            error!(?err, user_id = %caller.id, "failed to encode registration");
            return JsonResponse::server_error("Failed to save registration").into_response();
        }
    };

    if let Err(err) = state.store.insert("event_registrations", row).await {
        error!(?err, user_id = %caller.id, "failed to save registration");
        return JsonResponse::server_error("Failed to save registration").into_response();
    }

    Json(json!({ "success": true, "registration": registration })).into_response()
}

/// Owner-scoped cancellation: flips the registration's status to
/// `cancelled` without touching payment state.
pub async fn cancel_registration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let caller = match resolve_caller(&state, bearer.as_ref()).await {
        Ok((caller, _)) => caller,
        Err(response) => return response,
    };

    let owner_scope = [Filter::eq("id", id), Filter::eq("user_id", caller.id)];

    let existing = match state
        .store
        .select("event_registrations", &owner_scope, None, Some(1))
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, user_id = %caller.id, %id, "failed to look up registration");
            return JsonResponse::server_error("Failed to cancel registration").into_response();
        }
    };

    if existing.is_empty() {
        return JsonResponse::not_found("Registration not found").into_response();
    }

    if let Err(err) = state
        .store
        .update(
            "event_registrations",
            &owner_scope,
            json!({ "status": RegistrationStatus::Cancelled.to_string() }),
        )
        .await
    {
        error!(?err, user_id = %caller.id, %id, "failed to cancel registration");
        return JsonResponse::server_error("Failed to cancel registration").into_response();
    }

    JsonResponse::success("Registration cancelled").into_response()
}

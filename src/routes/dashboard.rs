use axum::{
    extract::{Json, State},
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use serde_json::json;
use tracing::error;

use crate::models::contact::ContactMessage;
use crate::models::registration::EventRegistration;
use crate::responses::JsonResponse;
use crate::routes::account::resolve_caller;
use crate::services::supabase::{Filter, Order};
use crate::state::AppState;

const RECENT_LIMIT: u32 = 5;

/// Aggregated operator view: live counts plus the newest activity.
/// Administrator only; responses must never be cached by intermediaries.
pub async fn dashboard_stats(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let caller = match resolve_caller(&state, bearer.as_ref()).await {
        Ok((caller, _)) => caller,
        Err(response) => return response,
    };

    if !caller.is_admin() {
        return JsonResponse::forbidden("Administrator access required").into_response();
    }

    // "Bookings" on the dashboard are registration rows.
    let upcoming_filter = [Filter::eq("status", "upcoming")];
    let unanswered_filter = [Filter::eq("responded", false)];
    let fetched = tokio::try_join!(
        state
            .store
            .select("event_tracking", &upcoming_filter, None, None,),
        state.store.select("event_registrations", &[], None, None),
        state.store.select("contacts", &[], None, None),
        state
            .store
            .select("contacts", &unanswered_filter, None, None),
        state.store.select(
            "event_registrations",
            &[],
            Some(Order::desc("created_at")),
            Some(RECENT_LIMIT),
        ),
        state.store.select(
            "contacts",
            &[],
            Some(Order::desc("created_at")),
            Some(RECENT_LIMIT),
        ),
    );

    let (upcoming, registrations, messages, unanswered, recent_rows, recent_message_rows) =
        match fetched {
            Ok(results) => results,
            Err(err) => {
                error!(?err, "failed to load dashboard data");
                return JsonResponse::server_error("Failed to load dashboard").into_response();
            }
        };

    let recent_bookings: Vec<EventRegistration> = match recent_rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
    {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, "registration row failed to decode");
            return JsonResponse::server_error("Failed to load dashboard").into_response();
        }
    };

    let recent_messages: Vec<ContactMessage> = match recent_message_rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
    {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, "contact row failed to decode");
            return JsonResponse::server_error("Failed to load dashboard").into_response();
        }
    };

    let response = Json(json!({
        "success": true,
        "stats": {
            "upcoming_events": upcoming.len(),
            "total_bookings": registrations.len(),
            "total_messages": messages.len(),
            "new_messages": unanswered.len(),
        },
        "recent_bookings": recent_bookings,
        "recent_messages": recent_messages,
    }));

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        response,
    )
        .into_response()
}

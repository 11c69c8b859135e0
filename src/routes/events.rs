use axum::{
    extract::{Json, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::models::event::{Event, EventQuery};
use crate::models::tracking::TrackedEvent;
use crate::responses::JsonResponse;
use crate::services::supabase::{Filter, Order};
use crate::state::AppState;

/// Public catalog listing, soonest date first.
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Response {
    let mut filters = Vec::new();
    if let Some(featured) = query.featured {
        filters.push(Filter::eq("featured", featured));
    }
    if let Some(category) = query.category.as_deref() {
        filters.push(Filter::eq("category", category));
    }

    let rows = match state
        .store
        .select("events", &filters, Some(Order::asc("date")), query.limit)
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, "failed to load event catalog");
            return JsonResponse::server_error("Failed to load events").into_response();
        }
    };

    let events: Vec<Event> = match rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
    {
        Ok(events) => events,
        Err(err) => {
            error!(?err, "event row failed to decode");
            return JsonResponse::server_error("Failed to load events").into_response();
        }
    };

    Json(json!({ "success": true, "events": events })).into_response()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<u32>,
}

/// Tracked occurrences still ahead of their date, soonest first.
pub async fn list_upcoming_events(
    State(state): State<AppState>,
    Query(query): Query<UpcomingQuery>,
) -> Response {
    let rows = match state
        .store
        .select(
            "event_tracking",
            &[Filter::eq("status", "upcoming")],
            Some(Order::asc("event_date")),
            query.limit,
        )
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            error!(?err, "failed to load upcoming events");
            return JsonResponse::server_error("Failed to load upcoming events").into_response();
        }
    };

    let events: Vec<TrackedEvent> = match rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()
    {
        Ok(events) => events,
        Err(err) => {
            error!(?err, "tracking row failed to decode");
            return JsonResponse::server_error("Failed to load upcoming events").into_response();
        }
    };

    Json(json!({ "success": true, "events": events })).into_response()
}

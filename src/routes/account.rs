use axum::{
    extract::{Json, Path, State},
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::deletion::{Actor, DeletionError};
use crate::models::user::AuthUser;
use crate::responses::JsonResponse;
use crate::services::supabase::AuthApiError;
use crate::state::AppState;

/// Resolves the Bearer token to its identity, or the 401 the caller gets
/// back when that fails.
pub(super) async fn resolve_caller(
    state: &AppState,
    bearer: Option<&TypedHeader<Authorization<Bearer>>>,
) -> Result<(AuthUser, String), Response> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(JsonResponse::unauthorized("Missing access token").into_response());
    };

    let token = bearer.token();
    match state.auth.get_user(token).await {
        Ok(user) => Ok((user, token.to_string())),
        Err(AuthApiError::Unauthorized) | Err(AuthApiError::NotFound) => {
            Err(JsonResponse::unauthorized("Invalid access token").into_response())
        }
        Err(err) => {
            error!(?err, "failed to resolve caller identity");
            Err(JsonResponse::server_error("Failed to resolve account").into_response())
        }
    }
}

/// Self-service deletion: the authenticated caller removes their own
/// account and every row referencing it.
pub async fn handle_delete_account(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let (caller, token) = match resolve_caller(&state, bearer.as_ref()).await {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    let actor = Actor::session(caller.id, token);
    match state.deletion.delete_account(&actor, caller.id).await {
        Ok(outcome) => {
            info!(
                user_id = %caller.id,
                warnings = outcome.warnings.len(),
                "account deleted"
            );
            Json(json!({
                "success": true,
                "message": "Your account and data have been deleted",
                "warnings": outcome.warnings.len(),
            }))
            .into_response()
        }
        Err(err) => {
            error!(?err, user_id = %caller.id, "account deletion failed");
            JsonResponse::server_error("Failed to delete account").into_response()
        }
    }
}

/// Administrative deletion of an arbitrary account. The caller's identity
/// must carry the `is_admin` privilege flag.
pub async fn handle_delete_user_admin(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let (caller, token) = match resolve_caller(&state, bearer.as_ref()).await {
        Ok(resolved) => resolved,
        Err(response) => return response,
    };

    if !caller.is_admin() {
        return JsonResponse::forbidden("Administrator access required").into_response();
    }

    let actor = Actor::admin_session(caller.id, token);
    match state.deletion.delete_account(&actor, user_id).await {
        Ok(outcome) => {
            info!(
                admin = %caller.id,
                user_id = %user_id,
                warnings = outcome.warnings.len(),
                "account deleted by administrator"
            );
            Json(json!({
                "success": true,
                "message": "Account deleted",
                "warnings": outcome.warnings.len(),
            }))
            .into_response()
        }
        Err(DeletionError::Unauthorized { .. }) => {
            JsonResponse::forbidden("Administrator access required").into_response()
        }
        Err(err) => {
            error!(?err, user_id = %user_id, "administrative account deletion failed");
            JsonResponse::server_error("Failed to delete account").into_response()
        }
    }
}

use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::responses::JsonResponse;
use crate::services::supabase::AuthApiError;
use crate::state::AppState;

#[derive(Deserialize, Serialize)]
pub struct CredentialsPayload {
    pub email: String,
    pub password: String,
}

pub async fn handle_signin(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Response {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return JsonResponse::bad_request("Email and password are required").into_response();
    }

    let session = match state.auth.sign_in(email, &payload.password).await {
        Ok(session) => session,
        Err(AuthApiError::InvalidCredentials) => {
            return JsonResponse::unauthorized("Invalid credentials").into_response()
        }
        Err(err) => {
            error!(?err, "sign-in request failed");
            return JsonResponse::server_error("Sign in failed").into_response();
        }
    };

    if session.user.is_soft_deleted() {
        // Identity is pending hard deletion. Revoke the token that was just
        // issued and refuse the sign-in.
        if let Err(err) = state.auth.sign_out(&session.access_token).await {
            warn!(?err, user_id = %session.user.id, "failed to revoke session of deleted account");
        }
        return JsonResponse::forbidden_with_code(
            "This account has been deleted",
            "ACCOUNT_DELETED",
        )
        .into_response();
    }

    Json(json!({ "success": true, "session": session })).into_response()
}

pub async fn handle_signup(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Response {
    let email = payload.email.trim();
    if email.is_empty() || payload.password.is_empty() {
        return JsonResponse::bad_request("Email and password are required").into_response();
    }

    match state.auth.sign_up(email, &payload.password).await {
        Ok(Some(session)) => Json(json!({ "success": true, "session": session })).into_response(),
        Ok(None) => {
            JsonResponse::success("Check your email to confirm your account").into_response()
        }
        Err(err) => {
            error!(?err, "sign-up request failed");
            JsonResponse::server_error("Sign up failed").into_response()
        }
    }
}

pub async fn handle_signout(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return JsonResponse::unauthorized("Missing access token").into_response();
    };

    match state.auth.sign_out(bearer.token()).await {
        // A token the backend no longer recognizes is already signed out.
        Ok(()) | Err(AuthApiError::Unauthorized) | Err(AuthApiError::NotFound) => {
            JsonResponse::success("Signed out").into_response()
        }
        Err(err) => {
            error!(?err, "sign-out request failed");
            JsonResponse::server_error("Sign out failed").into_response()
        }
    }
}

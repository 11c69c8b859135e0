use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{AuthApi, AuthApiError};
use crate::models::user::{AuthUser, Session};

/// Auth client. User-scoped calls send the project `apikey` plus the
/// caller's bearer token; admin endpoints authenticate with the
/// service-role key on both headers.
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    api_key: String,
    service_role_key: String,
}

impl SupabaseAuth {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        service_role_key: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            api_key: api_key.into(),
            service_role_key: service_role_key.into(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    async fn send_user(
        &self,
        req: reqwest::RequestBuilder,
        bearer: &str,
    ) -> Result<reqwest::Response, AuthApiError> {
        req.header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|err| AuthApiError::Transport(err.to_string()))
    }

    async fn send_admin(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AuthApiError> {
        req.header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .send()
            .await
            .map_err(|err| AuthApiError::Transport(err.to_string()))
    }
}

async fn error_for(res: reqwest::Response) -> AuthApiError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AuthApiError::Unauthorized,
        StatusCode::NOT_FOUND => AuthApiError::NotFound,
        _ => AuthApiError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

async fn decode_user(res: reqwest::Response) -> Result<AuthUser, AuthApiError> {
    res.json::<AuthUser>()
        .await
        .map_err(|err| AuthApiError::Decode(err.to_string()))
}

#[async_trait]
impl AuthApi for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthApiError> {
        let res = self
            .send_user(
                self.client
                    .post(self.auth_url("/token?grant_type=password"))
                    .json(&json!({ "email": email, "password": password })),
                &self.api_key,
            )
            .await?;

        match res.status() {
            status if status.is_success() => res
                .json::<Session>()
                .await
                .map_err(|err| AuthApiError::Decode(err.to_string())),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthApiError::InvalidCredentials)
            }
            _ => Err(error_for(res).await),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, AuthApiError> {
        let res = self
            .send_user(
                self.client
                    .post(self.auth_url("/signup"))
                    .json(&json!({ "email": email, "password": password })),
                &self.api_key,
            )
            .await?;

        if !res.status().is_success() {
            return Err(error_for(res).await);
        }

        // With autoconfirm enabled the response is a full token bundle;
        // otherwise it is the bare user pending email confirmation.
        let body: Value = res
            .json()
            .await
            .map_err(|err| AuthApiError::Decode(err.to_string()))?;
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)
                .map_err(|err| AuthApiError::Decode(err.to_string()))?;
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError> {
        let res = self
            .send_user(self.client.post(self.auth_url("/logout")), access_token)
            .await?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(error_for(res).await)
        }
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError> {
        let res = self
            .send_user(self.client.get(self.auth_url("/user")), access_token)
            .await?;
        if res.status().is_success() {
            decode_user(res).await
        } else {
            Err(error_for(res).await)
        }
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        patch: Value,
    ) -> Result<AuthUser, AuthApiError> {
        let res = self
            .send_user(
                self.client
                    .put(self.auth_url("/user"))
                    .json(&json!({ "data": patch })),
                access_token,
            )
            .await?;
        if res.status().is_success() {
            decode_user(res).await
        } else {
            Err(error_for(res).await)
        }
    }

    async fn admin_get_user(&self, user_id: Uuid) -> Result<AuthUser, AuthApiError> {
        let res = self
            .send_admin(
                self.client
                    .get(self.auth_url(&format!("/admin/users/{}", user_id))),
            )
            .await?;
        if res.status().is_success() {
            decode_user(res).await
        } else {
            Err(error_for(res).await)
        }
    }

    async fn admin_update_user_metadata(
        &self,
        user_id: Uuid,
        patch: Value,
    ) -> Result<AuthUser, AuthApiError> {
        let res = self
            .send_admin(
                self.client
                    .put(self.auth_url(&format!("/admin/users/{}", user_id)))
                    .json(&json!({ "user_metadata": patch })),
            )
            .await?;
        if res.status().is_success() {
            decode_user(res).await
        } else {
            Err(error_for(res).await)
        }
    }

    async fn admin_delete_user(&self, user_id: Uuid) -> Result<(), AuthApiError> {
        let res = self
            .send_admin(
                self.client
                    .delete(self.auth_url(&format!("/admin/users/{}", user_id))),
            )
            .await?;
        if res.status().is_success() {
            Ok(())
        } else {
            Err(error_for(res).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_ID: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    fn auth_for(server: &httpmock::MockServer) -> SupabaseAuth {
        SupabaseAuth::new(Client::new(), server.base_url(), "anon-key", "service-key")
    }

    #[tokio::test]
    async fn sign_in_posts_password_grant_and_parses_session() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "password")
                .header("apikey", "anon-key")
                .json_body(json!({ "email": "user@example.com", "password": "hunter2" }));
            then.status(200).json_body(json!({
                "access_token": "jwt",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "refresh",
                "user": { "id": USER_ID, "email": "user@example.com" }
            }));
        });

        let session = auth_for(&server)
            .sign_in("user@example.com", "hunter2")
            .await
            .unwrap();
        mock.assert();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.id.to_string(), USER_ID);
    }

    #[tokio::test]
    async fn sign_in_maps_bad_request_to_invalid_credentials() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/auth/v1/token");
            then.status(400)
                .json_body(json!({ "error_description": "Invalid login credentials" }));
        });

        let err = auth_for(&server)
            .sign_in("user@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn sign_up_without_autoconfirm_returns_no_session() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/auth/v1/signup");
            then.status(200)
                .json_body(json!({ "id": USER_ID, "email": "new@example.com" }));
        });

        let session = auth_for(&server)
            .sign_up("new@example.com", "hunter2")
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn metadata_update_wraps_patch_in_data_field() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::PUT)
                .path("/auth/v1/user")
                .header("authorization", "Bearer user-jwt")
                .json_body(json!({ "data": { "deleted": true } }));
            then.status(200).json_body(json!({
                "id": USER_ID,
                "email": "user@example.com",
                "user_metadata": { "deleted": true }
            }));
        });

        let user = auth_for(&server)
            .update_user_metadata("user-jwt", json!({ "deleted": true }))
            .await
            .unwrap();
        mock.assert();
        assert!(user.is_soft_deleted());
    }

    #[tokio::test]
    async fn admin_calls_authenticate_with_service_role_key() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::DELETE)
                .path(format!("/auth/v1/admin/users/{}", USER_ID))
                .header("apikey", "service-key")
                .header("authorization", "Bearer service-key");
            then.status(200).json_body(json!({}));
        });

        auth_for(&server)
            .admin_delete_user(Uuid::parse_str(USER_ID).unwrap())
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn admin_get_user_maps_missing_identity_to_not_found() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET)
                .path(format!("/auth/v1/admin/users/{}", USER_ID));
            then.status(404).json_body(json!({ "msg": "user not found" }));
        });

        let err = auth_for(&server)
            .admin_get_user(Uuid::parse_str(USER_ID).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthApiError::NotFound));
    }
}

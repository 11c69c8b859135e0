use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Identity record as returned by the hosted auth store.
///
/// `user_metadata` is the user-writable map; a `deleted: true` entry there is
/// the soft-delete marker set ahead of hard deletion. `app_metadata` is
/// service-controlled and carries the `is_admin` privilege flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_sign_in_at: Option<OffsetDateTime>,
}

impl AuthUser {
    pub fn is_soft_deleted(&self) -> bool {
        self.user_metadata
            .get("deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.app_metadata
            .get("is_admin")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Token bundle issued by the auth store on sign-in or sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

//! Client for the hosted database-and-auth backend.
//!
//! The platform exposes two HTTP surfaces: a REST rows interface
//! (`/rest/v1`) for table reads/writes and stored-procedure calls, and an
//! auth interface (`/auth/v1`) for sessions and identity administration.
//! Everything else in this crate consumes them through the [`DataStore`]
//! and [`AuthApi`] traits so tests can substitute [`MockBackend`].

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::user::{AuthUser, Session};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("unfiltered write to {0} rejected")]
    UnfilteredWrite(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthApiError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing or invalid access token")]
    Unauthorized,
    #[error("user not found")]
    NotFound,
    #[error("auth request failed: {0}")]
    Transport(String),
    #[error("auth backend returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Equality filter on one column, rendered as `column=eq.value` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }
}

/// Result ordering on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Generic rows interface: query / insert / update / delete / rpc.
///
/// Rows travel as raw JSON values; callers deserialize into the typed
/// models where they need the structure.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, StoreError>;

    /// Inserts one object or an array of objects into `table`.
    async fn insert(&self, table: &str, rows: Value) -> Result<(), StoreError>;

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), StoreError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError>;

    /// Invokes a server-side function. Functions without a return value
    /// yield `Value::Null`.
    async fn rpc(&self, function: &str, args: Value) -> Result<Value, StoreError>;
}

/// Auth surface: user-scoped session operations plus the administrative
/// identity endpoints that require the service-role credential.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthApiError>;

    /// Registers a new identity. Returns `None` when the backend defers the
    /// session until the address is confirmed.
    async fn sign_up(&self, email: &str, password: &str)
        -> Result<Option<Session>, AuthApiError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError>;

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError>;

    /// Merges `patch` into the calling user's own metadata map.
    async fn update_user_metadata(
        &self,
        access_token: &str,
        patch: Value,
    ) -> Result<AuthUser, AuthApiError>;

    async fn admin_get_user(&self, user_id: Uuid) -> Result<AuthUser, AuthApiError>;

    /// Merges `patch` into an arbitrary user's metadata map (service role).
    async fn admin_update_user_metadata(
        &self,
        user_id: Uuid,
        patch: Value,
    ) -> Result<AuthUser, AuthApiError>;

    async fn admin_delete_user(&self, user_id: Uuid) -> Result<(), AuthApiError>;
}

mod auth;
mod mock;
mod rest;

pub use auth::SupabaseAuth;
#[allow(unused_imports)]
pub use mock::MockBackend;
pub use rest::SupabaseRest;

#![allow(dead_code)]
use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{AuthApi, AuthApiError, DataStore, Filter, Order, StoreError};
use crate::models::user::{AuthUser, Session};

/// In-memory stand-in for the hosted backend, implementing both traits.
/// Tables hold raw JSON rows; knobs force individual operations to fail so
/// tests can exercise the skip-forward paths.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub tables: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    pub users: Arc<Mutex<Vec<AuthUser>>>,
    pub credentials: Arc<Mutex<HashMap<String, (Uuid, String)>>>,
    pub tokens: Arc<Mutex<HashMap<String, Uuid>>>,
    pub revoked_tokens: Arc<Mutex<Vec<String>>>,
    pub deleted_user_ids: Arc<Mutex<Vec<Uuid>>>,
    pub rpc_calls: Arc<Mutex<Vec<(String, Value)>>>,
    pub rpc_results: Arc<Mutex<HashMap<String, Value>>>,
    pub fail_tables: Arc<Mutex<HashSet<String>>>,
    pub fail_rpc: Arc<Mutex<HashSet<String>>>,
    pub fail_admin_get: Arc<Mutex<bool>>,
    pub fail_admin_update: Arc<Mutex<bool>>,
    pub fail_admin_delete: Arc<Mutex<bool>>,
    pub fail_sign_out: Arc<Mutex<bool>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: AuthUser) -> Self {
        self.users.lock().unwrap().push(user);
        self
    }

    pub fn with_credentials(self, email: &str, password: &str, user_id: Uuid) -> Self {
        self.credentials
            .lock()
            .unwrap()
            .insert(email.to_string(), (user_id, password.to_string()));
        self
    }

    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
        self
    }

    pub fn with_token(self, token: &str, user_id: Uuid) -> Self {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), user_id);
        self
    }

    pub fn fail_table(&self, table: &str) {
        self.fail_tables.lock().unwrap().insert(table.to_string());
    }

    pub fn fail_rpc_function(&self, function: &str) {
        self.fail_rpc.lock().unwrap().insert(function.to_string());
    }

    pub fn set_rpc_result(&self, function: &str, result: Value) {
        self.rpc_results
            .lock()
            .unwrap()
            .insert(function.to_string(), result);
    }

    /// Rows currently stored for `table`; empty if the table was never
    /// written.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn table_check(&self, table: &str) -> Result<(), StoreError> {
        if self.fail_tables.lock().unwrap().contains(table) {
            return Err(StoreError::Api {
                status: 500,
                body: format!("forced failure for {table}"),
            });
        }
        Ok(())
    }

    fn find_user(&self, user_id: Uuid) -> Option<AuthUser> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
    }

    fn user_for_token(&self, token: &str) -> Option<AuthUser> {
        let user_id = *self.tokens.lock().unwrap().get(token)?;
        self.find_user(user_id)
    }

    fn session_for(&self, user: AuthUser) -> Session {
        let token = format!("token-{}", Uuid::new_v4());
        self.tokens.lock().unwrap().insert(token.clone(), user.id);
        Session {
            access_token: token,
            token_type: "bearer".to_string(),
            expires_in: Some(3600),
            refresh_token: Some(format!("refresh-{}", Uuid::new_v4())),
            user,
        }
    }
}

fn field_matches(field: Option<&Value>, want: &str) -> bool {
    match field {
        Some(Value::String(s)) => s == want,
        Some(Value::Bool(b)) => b.to_string() == want,
        Some(Value::Number(n)) => n.to_string() == want,
        _ => false,
    }
}

fn row_matches(row: &Value, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| field_matches(row.get(&f.column), &f.value))
}

fn render_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn compare_rows(a: &Value, b: &Value, column: &str) -> CmpOrdering {
    let (va, vb) = (a.get(column), b.get(column));
    if let (Some(x), Some(y)) = (
        va.and_then(Value::as_f64),
        vb.and_then(Value::as_f64),
    ) {
        return x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal);
    }
    render_field(va).cmp(&render_field(vb))
}

#[async_trait]
impl DataStore for MockBackend {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, StoreError> {
        self.table_check(table)?;
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| row_matches(row, filters))
            .collect();
        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ord = compare_rows(a, b, &order.column);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<(), StoreError> {
        self.table_check(table)?;
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table.to_string()).or_default();
        match rows {
            Value::Array(items) => entry.extend(items),
            single => entry.push(single),
        }
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), StoreError> {
        self.table_check(table)?;
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Decode(format!(
                    "update patch must be an object, got {other}"
                )))
            }
        };
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| row_matches(row, filters)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        self.table_check(table)?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| !row_matches(row, filters));
        }
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, StoreError> {
        self.rpc_calls
            .lock()
            .unwrap()
            .push((function.to_string(), args));
        if self.fail_rpc.lock().unwrap().contains(function) {
            return Err(StoreError::Api {
                status: 500,
                body: format!("forced failure for rpc {function}"),
            });
        }
        Ok(self
            .rpc_results
            .lock()
            .unwrap()
            .get(function)
            .cloned()
            .unwrap_or(Value::Null))
    }
}

#[async_trait]
impl AuthApi for MockBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthApiError> {
        let user_id = {
            let credentials = self.credentials.lock().unwrap();
            match credentials.get(email) {
                Some((user_id, stored)) if stored == password => *user_id,
                _ => return Err(AuthApiError::InvalidCredentials),
            }
        };
        let user = self.find_user(user_id).ok_or(AuthApiError::NotFound)?;
        Ok(self.session_for(user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, AuthApiError> {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: Map::new(),
            app_metadata: Map::new(),
            created_at: None,
            last_sign_in_at: None,
        };
        self.credentials
            .lock()
            .unwrap()
            .insert(email.to_string(), (user.id, password.to_string()));
        self.users.lock().unwrap().push(user.clone());
        Ok(Some(self.session_for(user)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError> {
        if *self.fail_sign_out.lock().unwrap() {
            return Err(AuthApiError::Api {
                status: 500,
                body: "forced sign-out failure".to_string(),
            });
        }
        self.tokens.lock().unwrap().remove(access_token);
        self.revoked_tokens
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError> {
        self.user_for_token(access_token)
            .ok_or(AuthApiError::Unauthorized)
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        patch: Value,
    ) -> Result<AuthUser, AuthApiError> {
        let user = self
            .user_for_token(access_token)
            .ok_or(AuthApiError::Unauthorized)?;
        self.admin_update_user_metadata(user.id, patch).await
    }

    async fn admin_get_user(&self, user_id: Uuid) -> Result<AuthUser, AuthApiError> {
        if *self.fail_admin_get.lock().unwrap() {
            return Err(AuthApiError::Api {
                status: 500,
                body: "forced identity fetch failure".to_string(),
            });
        }
        self.find_user(user_id).ok_or(AuthApiError::NotFound)
    }

    async fn admin_update_user_metadata(
        &self,
        user_id: Uuid,
        patch: Value,
    ) -> Result<AuthUser, AuthApiError> {
        if *self.fail_admin_update.lock().unwrap() {
            return Err(AuthApiError::Api {
                status: 500,
                body: "forced metadata update failure".to_string(),
            });
        }
        let patch = match patch {
            Value::Object(map) => map,
            other => return Err(AuthApiError::Decode(format!("expected object, got {other}"))),
        };
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(AuthApiError::NotFound)?;
        for (key, value) in patch {
            user.user_metadata.insert(key, value);
        }
        Ok(user.clone())
    }

    async fn admin_delete_user(&self, user_id: Uuid) -> Result<(), AuthApiError> {
        if *self.fail_admin_delete.lock().unwrap() {
            return Err(AuthApiError::Api {
                status: 500,
                body: "forced hard delete failure".to_string(),
            });
        }
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != user_id);
        if users.len() == before {
            return Err(AuthApiError::NotFound);
        }
        self.deleted_user_ids.lock().unwrap().push(user_id);
        Ok(())
    }
}

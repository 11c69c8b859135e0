use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{DataStore, Filter, Order, StoreError};

/// Rows client for the backend's REST surface.
///
/// Every request carries the project `apikey` header plus a bearer
/// credential. Constructed with the service-role key it bypasses row-level
/// security entirely, so callers are responsible for scoping their filters
/// to the acting user.
pub struct SupabaseRest {
    client: Client,
    base_url: String,
    api_key: String,
    bearer: String,
}

impl SupabaseRest {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            client,
            base_url: trim_base(base_url.into()),
            bearer: api_key.clone(),
            api_key,
        }
    }

    /// Replaces the bearer credential (service-role key or a user access
    /// token) while keeping the project `apikey` header as constructed.
    pub fn with_bearer(mut self, bearer: impl Into<String>) -> Self {
        self.bearer = bearer.into();
        self
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, query)
        }
    }

    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let res = req
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res)
    }
}

fn trim_base(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Renders the query string for a rows request: equality filters, optional
/// ordering, optional limit. Values are percent-encoded; column names are
/// schema identifiers and pass through untouched.
pub(super) fn row_query(
    select: bool,
    filters: &[Filter],
    order: Option<&Order>,
    limit: Option<u32>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if select {
        parts.push("select=*".to_string());
    }
    for filter in filters {
        parts.push(format!(
            "{}=eq.{}",
            filter.column,
            urlencoding::encode(&filter.value)
        ));
    }
    if let Some(order) = order {
        let dir = if order.ascending { "asc" } else { "desc" };
        parts.push(format!("order={}.{}", order.column, dir));
    }
    if let Some(limit) = limit {
        parts.push(format!("limit={}", limit));
    }
    parts.join("&")
}

#[async_trait]
impl DataStore for SupabaseRest {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, StoreError> {
        let query = row_query(true, filters, order.as_ref(), limit);
        let res = self.execute(self.client.get(self.table_url(table, &query))).await?;
        res.json::<Vec<Value>>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))
    }

    async fn insert(&self, table: &str, rows: Value) -> Result<(), StoreError> {
        self.execute(
            self.client
                .post(self.table_url(table, ""))
                .header("Prefer", "return=minimal")
                .json(&rows),
        )
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<(), StoreError> {
        if filters.is_empty() {
            return Err(StoreError::UnfilteredWrite(table.to_string()));
        }
        let query = row_query(false, filters, None, None);
        self.execute(
            self.client
                .patch(self.table_url(table, &query))
                .header("Prefer", "return=minimal")
                .json(&patch),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        if filters.is_empty() {
            return Err(StoreError::UnfilteredWrite(table.to_string()));
        }
        let query = row_query(false, filters, None, None);
        self.execute(self.client.delete(self.table_url(table, &query)))
            .await?;
        Ok(())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, StoreError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        let res = self.execute(self.client.post(url).json(&args)).await?;
        if res.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        let text = res
            .text()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

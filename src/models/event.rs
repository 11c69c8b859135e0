use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Catalog row from the `events` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub title: String,
    pub description: String,
    pub date: String,
    pub location: String,
    pub image_url: Option<String>,
    pub category: String,
    pub featured: bool,
}

/// Filters accepted by the catalog listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub featured: Option<bool>,
    pub category: Option<String>,
    pub limit: Option<u32>,
}

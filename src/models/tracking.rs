use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    Upcoming,
    Cancelled,
    Completed,
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackingStatus::Upcoming => "upcoming",
            TrackingStatus::Cancelled => "cancelled",
            TrackingStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

/// Row from the `event_tracking` table: a calendar-scheduled occurrence
/// derived from a confirmed registration. `booking_id` back-references the
/// originating `event_registrations` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEvent {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub location: String,
    pub status: TrackingStatus,
    pub booking_id: Uuid,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

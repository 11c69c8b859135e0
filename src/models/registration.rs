use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStatus {
    Submitted,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Submitted => "submitted",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::InProgress => "in-progress",
            RegistrationStatus::Completed => "completed",
            RegistrationStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Row from the `event_registrations` table: a customer's event-service
/// request, owned by the requesting account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRegistration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub guest_count: i32,
    pub location: String,
    pub budget: f64,
    pub special_requests: Option<String>,
    pub contact_phone: String,
    pub contact_email: String,
    pub payment_status: PaymentStatus,
    pub status: RegistrationStatus,
    // "HH:MM" wall-clock strings, matching the stored column format
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for a new registration. `payment_status` and `status`
/// are stamped server-side (`pending` / `submitted`), never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRegistration {
    pub event_type: String,
    pub event_date: NaiveDate,
    pub guest_count: i32,
    pub location: String,
    pub budget: f64,
    pub special_requests: Option<String>,
    pub contact_phone: String,
    pub contact_email: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

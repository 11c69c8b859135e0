use serde::{Deserialize, Serialize};

/// Lifecycle of a `bookings` row. New bookings always enter as `pending`;
/// staff move them forward out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

/// Caller-supplied part of a booking against a catalog event. `id` and
/// `created_at` are generated by the backend; `user_id` and `status` are
/// stamped server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub event_id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub guests: i32,
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Row from the `contacts` table. Tied to an account only by matching email
/// address, so account deletion must resolve the email before the identity
/// record disappears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub responded: bool,
}

/// Insert payload for an inbound inquiry; `responded` starts false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

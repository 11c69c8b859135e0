use core::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Row from the `deletion_requests` queue table. Rows are created out of
/// band, consumed by the batch processor, and marked processed; they are
/// never deleted (the table doubles as an audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    pub processed: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,
}

/// Cleanup step within one account-deletion invocation. Used to label
/// warnings and log lines; values appear in operator-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStep {
    IdentityFetch,
    RegistrationsDelete,
    BookingsDelete,
    TrackingDelete,
    ContactsDelete,
    SoftMark,
    SignOut,
}

impl fmt::Display for DeletionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeletionStep::IdentityFetch => "identity_fetch",
            DeletionStep::RegistrationsDelete => "registrations_delete",
            DeletionStep::BookingsDelete => "bookings_delete",
            DeletionStep::TrackingDelete => "tracking_delete",
            DeletionStep::ContactsDelete => "contacts_delete",
            DeletionStep::SoftMark => "soft_mark",
            DeletionStep::SignOut => "sign_out",
        };
        write!(f, "{}", s)
    }
}

/// A recoverable step failure recorded while the workflow kept going.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupWarning {
    pub step: DeletionStep,
    pub detail: String,
}

/// Terminal state of a successful deletion: the identity is gone; any
/// warnings describe partial cleanup that was skipped past.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionOutcome {
    pub user_id: Uuid,
    pub warnings: Vec<CleanupWarning>,
}

impl DeletionOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Tally for one batch run over the deletion-request queue.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeletionReport {
    pub processed: usize,
    pub failed: usize,
}

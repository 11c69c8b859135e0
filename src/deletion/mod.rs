//! Account deletion workflow.
//!
//! One canonical implementation serves both the self-service route and the
//! operator batch tool. The backend has no cascading delete across the
//! dependent tables, so ordering lives here: resolve the email first (contact
//! messages key on it), clear dependent rows, soft-mark the identity, then
//! hard-delete it. This is a compensating-action sequence over a remote
//! store, not a transaction; recoverable step failures are collected as
//! warnings and the workflow keeps going.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::deletion::{
    CleanupWarning, DeletionOutcome, DeletionReport, DeletionRequest, DeletionStep,
};
use crate::services::supabase::{AuthApi, AuthApiError, DataStore, Filter, Order, StoreError};

/// Budget for each network step; exceeding it counts as that step failing.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Party invoking the workflow.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub admin: bool,
    /// Session token to invalidate in the final step. The batch variant
    /// acts with the service-role credential and carries none.
    pub access_token: Option<String>,
}

impl Actor {
    /// An authenticated account owner.
    pub fn session(user_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            admin: false,
            access_token: Some(access_token.into()),
        }
    }

    /// An administrator acting from their own session.
    pub fn admin_session(user_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            admin: true,
            access_token: Some(access_token.into()),
        }
    }

    /// The out-of-band operator identity used by the batch processor.
    pub fn service_role() -> Self {
        Self {
            user_id: Uuid::nil(),
            admin: true,
            access_token: None,
        }
    }

    fn may_delete(&self, target: Uuid) -> bool {
        self.admin || self.user_id == target
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("account {target} may only be deleted by its owner or an administrator")]
    Unauthorized { actor: Uuid, target: Uuid },
    #[error("hard delete failed for {user_id}: {source}")]
    HardDeleteFailed {
        user_id: Uuid,
        #[source]
        source: AuthApiError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to read deletion queue: {0}")]
    QueueReadFailed(#[from] StoreError),
}

pub struct DeletionWorkflow {
    store: Arc<dyn DataStore>,
    auth: Arc<dyn AuthApi>,
}

impl DeletionWorkflow {
    pub fn new(store: Arc<dyn DataStore>, auth: Arc<dyn AuthApi>) -> Self {
        Self { store, auth }
    }

    /// Removes the target account and every row referencing it.
    ///
    /// Returns `Ok` only when the identity record itself was hard-deleted;
    /// recoverable step failures ride along as warnings on the outcome.
    /// `Unauthorized` is checked up front and causes no side effects.
    pub async fn delete_account(
        &self,
        actor: &Actor,
        target: Uuid,
    ) -> Result<DeletionOutcome, DeletionError> {
        if !actor.may_delete(target) {
            warn!(actor = %actor.user_id, %target, "refusing deletion of a foreign account");
            return Err(DeletionError::Unauthorized {
                actor: actor.user_id,
                target,
            });
        }

        let mut warnings: Vec<CleanupWarning> = Vec::new();

        // Step 1: the email has to be read before the identity record is
        // destroyed, or email-keyed contact rows become unreachable.
        let email = match step(self.auth.admin_get_user(target)).await {
            Ok(user) => user.email,
            Err(detail) => {
                warn!(%target, step = %DeletionStep::IdentityFetch, %detail, "proceeding without email cleanup");
                warnings.push(CleanupWarning {
                    step: DeletionStep::IdentityFetch,
                    detail,
                });
                None
            }
        };

        // Step 2: dependent rows, each set attempted independently.
        self.delete_tracking_rows(target, &mut warnings).await;

        for (step_kind, filter) in [
            (
                DeletionStep::RegistrationsDelete,
                ("event_registrations", Filter::eq("user_id", target)),
            ),
            (
                DeletionStep::BookingsDelete,
                ("bookings", Filter::eq("user_id", target)),
            ),
        ] {
            let (table, filter) = filter;
            if let Err(detail) = step(self.store.delete(table, &[filter])).await {
                error!(%target, step = %step_kind, %detail, "dependent delete failed");
                warnings.push(CleanupWarning {
                    step: step_kind,
                    detail,
                });
            }
        }

        match email.as_deref() {
            Some(email) => {
                if let Err(detail) =
                    step(self.store.delete("contacts", &[Filter::eq("email", email)])).await
                {
                    error!(%target, step = %DeletionStep::ContactsDelete, %detail, "dependent delete failed");
                    warnings.push(CleanupWarning {
                        step: DeletionStep::ContactsDelete,
                        detail,
                    });
                }
            }
            None => info!(%target, "no email resolved; skipping contact cleanup"),
        }

        // Step 3: soft-mark so a lingering identity can be rejected at
        // sign-in if the hard delete below fails or lags. Must have been
        // attempted before step 4 issues.
        if let Err(detail) = step(
            self.auth
                .admin_update_user_metadata(target, json!({ "deleted": true })),
        )
        .await
        {
            error!(%target, step = %DeletionStep::SoftMark, %detail, "soft mark failed");
            warnings.push(CleanupWarning {
                step: DeletionStep::SoftMark,
                detail,
            });
        }

        // Step 4: the one step whose failure fails the invocation.
        let hard_result = match tokio::time::timeout(STEP_TIMEOUT, self.auth.admin_delete_user(target)).await
        {
            Ok(result) => result,
            Err(_) => Err(AuthApiError::Transport(format!(
                "timed out after {}s",
                STEP_TIMEOUT.as_secs()
            ))),
        };

        // Step 5: eagerly end the actor's own session whatever happened
        // above; a partially deleted account must not stay logged in.
        if actor.user_id == target {
            if let Some(token) = actor.access_token.as_deref() {
                match tokio::time::timeout(STEP_TIMEOUT, self.auth.sign_out(token)).await {
                    Ok(Ok(())) => {}
                    // A rejected token means the session is already dead,
                    // which is the outcome this step exists to guarantee.
                    Ok(Err(AuthApiError::Unauthorized)) | Ok(Err(AuthApiError::NotFound)) => {}
                    Ok(Err(err)) => {
                        warn!(%target, step = %DeletionStep::SignOut, ?err, "session invalidation failed");
                        warnings.push(CleanupWarning {
                            step: DeletionStep::SignOut,
                            detail: err.to_string(),
                        });
                    }
                    Err(_) => {
                        warn!(%target, step = %DeletionStep::SignOut, "session invalidation timed out");
                        warnings.push(CleanupWarning {
                            step: DeletionStep::SignOut,
                            detail: format!("timed out after {}s", STEP_TIMEOUT.as_secs()),
                        });
                    }
                }
            }
        }

        match hard_result {
            Ok(()) => {
                if warnings.is_empty() {
                    info!(%target, "account fully deleted");
                } else {
                    warn!(%target, warning_count = warnings.len(), "account deleted with partial cleanup");
                }
                Ok(DeletionOutcome {
                    user_id: target,
                    warnings,
                })
            }
            Err(err) => {
                error!(%target, ?err, "hard delete failed; account remains soft-marked");
                Err(DeletionError::HardDeleteFailed {
                    user_id: target,
                    source: err,
                })
            }
        }
    }

    /// Clears calendar rows derived from the account's registrations. The
    /// back-reference goes through the registration id, so the ids are
    /// collected while those rows still exist.
    async fn delete_tracking_rows(&self, target: Uuid, warnings: &mut Vec<CleanupWarning>) {
        let registration_ids = match step(self.store.select(
            "event_registrations",
            &[Filter::eq("user_id", target)],
            None,
            None,
        ))
        .await
        {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_str).map(str::to_string))
                .collect::<Vec<_>>(),
            Err(detail) => {
                error!(%target, step = %DeletionStep::TrackingDelete, %detail, "failed to list registrations for tracking cleanup");
                warnings.push(CleanupWarning {
                    step: DeletionStep::TrackingDelete,
                    detail: format!("listing registrations failed: {detail}"),
                });
                return;
            }
        };

        for registration_id in &registration_ids {
            if let Err(detail) = step(self.store.delete(
                "event_tracking",
                &[Filter::eq("booking_id", registration_id.as_str())],
            ))
            .await
            {
                error!(%target, step = %DeletionStep::TrackingDelete, registration_id, %detail, "tracking delete failed");
                warnings.push(CleanupWarning {
                    step: DeletionStep::TrackingDelete,
                    detail: format!("registration {registration_id}: {detail}"),
                });
            }
        }
    }

    /// Drains the `deletion_requests` queue oldest-first. Every readable
    /// request is marked processed whether or not its cleanup succeeded;
    /// failures are logged, never retried automatically, and never stop the
    /// remaining queue.
    #[allow(dead_code)]
    pub async fn process_queued_deletions(&self) -> Result<DeletionReport, BatchError> {
        let rows = self
            .store
            .select(
                "deletion_requests",
                &[Filter::eq("processed", false)],
                Some(Order::asc("requested_at")),
                None,
            )
            .await?;

        info!(pending = rows.len(), "processing deletion queue");
        let mut report = DeletionReport::default();

        for row in rows {
            let request: DeletionRequest = match serde_json::from_value(row) {
                Ok(request) => request,
                Err(err) => {
                    error!(?err, "skipping malformed deletion request row");
                    report.failed += 1;
                    continue;
                }
            };

            let succeeded = match self
                .delete_account(&Actor::service_role(), request.user_id)
                .await
            {
                Ok(outcome) if outcome.is_clean() => {
                    info!(user_id = %request.user_id, email = %request.user_email, "queued deletion completed");
                    true
                }
                Ok(outcome) => {
                    warn!(
                        user_id = %request.user_id,
                        email = %request.user_email,
                        warning_count = outcome.warnings.len(),
                        "queued deletion completed with partial cleanup"
                    );
                    true
                }
                Err(err) => {
                    error!(user_id = %request.user_id, ?err, "queued deletion failed");
                    false
                }
            };

            // Handled is not the same as successful: the request is consumed
            // either way and failures live in the log only.
            if let Err(err) = self.mark_processed(request.id).await {
                error!(request_id = %request.id, ?err, "failed to mark deletion request processed");
                report.failed += 1;
                continue;
            }

            if succeeded {
                report.processed += 1;
            } else {
                report.failed += 1;
            }
        }

        Ok(report)
    }

    async fn mark_processed(&self, request_id: Uuid) -> Result<(), StoreError> {
        self.store
            .update(
                "deletion_requests",
                &[Filter::eq("id", request_id)],
                json!({
                    "processed": true,
                    "processed_at": format_timestamp(OffsetDateTime::now_utc()),
                }),
            )
            .await
    }
}

/// Runs one workflow step under [`STEP_TIMEOUT`], flattening errors and
/// timeouts into a loggable detail string.
async fn step<T, E: std::fmt::Display>(
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, String> {
    match tokio::time::timeout(STEP_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err(format!("timed out after {}s", STEP_TIMEOUT.as_secs())),
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::AuthUser;
    use crate::services::supabase::MockBackend;
    use serde_json::{json, Map};

    fn user(id: Uuid, email: &str) -> AuthUser {
        AuthUser {
            id,
            email: Some(email.to_string()),
            user_metadata: Map::new(),
            app_metadata: Map::new(),
            created_at: None,
            last_sign_in_at: None,
        }
    }

    fn workflow_over(mock: &MockBackend) -> DeletionWorkflow {
        DeletionWorkflow::new(Arc::new(mock.clone()), Arc::new(mock.clone()))
    }

    fn seeded_backend(user_id: Uuid, email: &str) -> MockBackend {
        let reg_id = "a3bb189e-8bf9-3888-9912-ace4e6543002";
        MockBackend::new()
            .with_user(user(user_id, email))
            .with_rows(
                "event_registrations",
                vec![
                    json!({ "id": reg_id, "user_id": user_id.to_string() }),
                    json!({ "id": "ffffffff-0000-0000-0000-000000000001", "user_id": Uuid::new_v4().to_string() }),
                ],
            )
            .with_rows(
                "bookings",
                vec![
                    json!({ "id": 1, "user_id": user_id.to_string() }),
                    json!({ "id": 2, "user_id": user_id.to_string() }),
                    json!({ "id": 3, "user_id": Uuid::new_v4().to_string() }),
                ],
            )
            .with_rows(
                "contacts",
                vec![
                    json!({ "id": 1, "email": email }),
                    json!({ "id": 2, "email": "someone-else@example.com" }),
                ],
            )
            .with_rows(
                "event_tracking",
                vec![
                    json!({ "id": "t1", "booking_id": reg_id, "status": "upcoming" }),
                    json!({ "id": "t2", "booking_id": "ffffffff-0000-0000-0000-000000000001", "status": "upcoming" }),
                ],
            )
    }

    fn rows_for_user(mock: &MockBackend, table: &str, user_id: Uuid) -> usize {
        mock.rows(table)
            .iter()
            .filter(|row| row["user_id"] == user_id.to_string())
            .count()
    }

    #[tokio::test]
    async fn deletes_account_with_no_dependent_rows() {
        let user_id = Uuid::new_v4();
        let mock = MockBackend::new().with_user(user(user_id, "user@example.com"));
        let outcome = workflow_over(&mock)
            .delete_account(&Actor::session(user_id, "token"), user_id)
            .await
            .unwrap();

        assert!(outcome.is_clean());
        assert!(matches!(
            mock.admin_get_user(user_id).await,
            Err(AuthApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn removes_every_dependent_row_for_the_account() {
        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        let outcome = workflow_over(&mock)
            .delete_account(&Actor::session(user_id, "token"), user_id)
            .await
            .unwrap();

        assert!(outcome.is_clean());
        assert_eq!(rows_for_user(&mock, "event_registrations", user_id), 0);
        assert_eq!(rows_for_user(&mock, "bookings", user_id), 0);
        assert!(mock
            .rows("contacts")
            .iter()
            .all(|row| row["email"] != "user@example.com"));
        // rows owned by other accounts survive
        assert_eq!(mock.rows("event_registrations").len(), 1);
        assert_eq!(mock.rows("bookings").len(), 1);
        assert_eq!(mock.rows("contacts").len(), 1);
        // the derived calendar row for this account's registration is gone
        let tracking = mock.rows("event_tracking");
        assert_eq!(tracking.len(), 1);
        assert_eq!(tracking[0]["id"], "t2");
    }

    #[tokio::test]
    async fn soft_mark_persists_when_hard_delete_fails() {
        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        *mock.fail_admin_delete.lock().unwrap() = true;

        let err = workflow_over(&mock)
            .delete_account(&Actor::session(user_id, "token"), user_id)
            .await
            .unwrap_err();

        assert!(matches!(err, DeletionError::HardDeleteFailed { .. }));
        let remaining = mock.admin_get_user(user_id).await.unwrap();
        assert!(remaining.is_soft_deleted());
    }

    #[tokio::test]
    async fn unauthorized_actor_causes_no_side_effects() {
        let target = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mock = seeded_backend(target, "user@example.com");

        let err = workflow_over(&mock)
            .delete_account(&Actor::session(stranger, "token"), target)
            .await
            .unwrap_err();

        assert!(matches!(err, DeletionError::Unauthorized { .. }));
        assert_eq!(rows_for_user(&mock, "event_registrations", target), 1);
        assert_eq!(rows_for_user(&mock, "bookings", target), 2);
        assert_eq!(mock.rows("contacts").len(), 2);
        let untouched = mock.admin_get_user(target).await.unwrap();
        assert!(!untouched.is_soft_deleted());
    }

    #[tokio::test]
    async fn service_role_actor_may_delete_any_account() {
        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        let outcome = workflow_over(&mock)
            .delete_account(&Actor::service_role(), user_id)
            .await
            .unwrap();
        assert!(outcome.is_clean());
        assert_eq!(mock.deleted_user_ids.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn identity_fetch_failure_skips_contact_cleanup_only() {
        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        *mock.fail_admin_get.lock().unwrap() = true;

        let outcome = workflow_over(&mock)
            .delete_account(&Actor::service_role(), user_id)
            .await
            .unwrap();

        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.step == DeletionStep::IdentityFetch));
        // contact rows were unreachable without the email and survive
        assert_eq!(mock.rows("contacts").len(), 2);
        // everything keyed by id is still cleaned up
        assert_eq!(rows_for_user(&mock, "event_registrations", user_id), 0);
        assert_eq!(rows_for_user(&mock, "bookings", user_id), 0);
    }

    #[tokio::test]
    async fn dependent_failure_does_not_block_other_steps() {
        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        mock.fail_table("bookings");

        let outcome = workflow_over(&mock)
            .delete_account(&Actor::service_role(), user_id)
            .await
            .unwrap();

        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.step == DeletionStep::BookingsDelete));
        assert_eq!(rows_for_user(&mock, "event_registrations", user_id), 0);
        assert!(mock
            .rows("contacts")
            .iter()
            .all(|row| row["email"] != "user@example.com"));
        // the identity is still gone; the booking rows are log material
        assert!(matches!(
            mock.admin_get_user(user_id).await,
            Err(AuthApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn actor_session_is_ended_even_when_hard_delete_fails() {
        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        *mock.fail_admin_delete.lock().unwrap() = true;

        let result = workflow_over(&mock)
            .delete_account(&Actor::session(user_id, "live-token"), user_id)
            .await;

        assert!(result.is_err());
        assert!(mock
            .revoked_tokens
            .lock()
            .unwrap()
            .contains(&"live-token".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn a_hanging_step_counts_as_that_step_failing() {
        struct HangingAuth {
            inner: MockBackend,
        }

        #[async_trait::async_trait]
        impl AuthApi for HangingAuth {
            async fn sign_in(
                &self,
                email: &str,
                password: &str,
            ) -> Result<crate::models::user::Session, AuthApiError> {
                self.inner.sign_in(email, password).await
            }
            async fn sign_up(
                &self,
                email: &str,
                password: &str,
            ) -> Result<Option<crate::models::user::Session>, AuthApiError> {
                self.inner.sign_up(email, password).await
            }
            async fn sign_out(&self, access_token: &str) -> Result<(), AuthApiError> {
                self.inner.sign_out(access_token).await
            }
            async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthApiError> {
                self.inner.get_user(access_token).await
            }
            async fn update_user_metadata(
                &self,
                access_token: &str,
                patch: Value,
            ) -> Result<AuthUser, AuthApiError> {
                self.inner.update_user_metadata(access_token, patch).await
            }
            async fn admin_get_user(&self, _user_id: Uuid) -> Result<AuthUser, AuthApiError> {
                std::future::pending().await
            }
            async fn admin_update_user_metadata(
                &self,
                user_id: Uuid,
                patch: Value,
            ) -> Result<AuthUser, AuthApiError> {
                self.inner.admin_update_user_metadata(user_id, patch).await
            }
            async fn admin_delete_user(&self, user_id: Uuid) -> Result<(), AuthApiError> {
                self.inner.admin_delete_user(user_id).await
            }
        }

        let user_id = Uuid::new_v4();
        let mock = seeded_backend(user_id, "user@example.com");
        let workflow = DeletionWorkflow::new(
            Arc::new(mock.clone()),
            Arc::new(HangingAuth {
                inner: mock.clone(),
            }),
        );

        let outcome = workflow
            .delete_account(&Actor::service_role(), user_id)
            .await
            .unwrap();

        // the stalled identity fetch became a warning, not a hang
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.step == DeletionStep::IdentityFetch && w.detail.contains("timed out")));
        assert_eq!(mock.rows("contacts").len(), 2);
    }

    fn queued_request(id: &str, user_id: Uuid, email: &str, requested_at: &str) -> Value {
        json!({
            "id": id,
            "user_id": user_id.to_string(),
            "user_email": email,
            "requested_at": requested_at,
            "processed": false,
            "processed_at": null
        })
    }

    #[tokio::test]
    async fn batch_marks_every_request_processed_and_isolates_failures() {
        let first = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let third = Uuid::new_v4();
        let mock = MockBackend::new()
            .with_user(user(first, "first@example.com"))
            .with_user(user(third, "third@example.com"))
            .with_rows(
                "deletion_requests",
                vec![
                    queued_request(
                        "11111111-1111-1111-1111-111111111111",
                        third,
                        "third@example.com",
                        "2025-05-03T00:00:00Z",
                    ),
                    queued_request(
                        "22222222-2222-2222-2222-222222222222",
                        first,
                        "first@example.com",
                        "2025-05-01T00:00:00Z",
                    ),
                    queued_request(
                        "33333333-3333-3333-3333-333333333333",
                        missing,
                        "gone@example.com",
                        "2025-05-02T00:00:00Z",
                    ),
                ],
            );

        let report = workflow_over(&mock).process_queued_deletions().await.unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        // oldest request first
        assert_eq!(
            mock.deleted_user_ids.lock().unwrap().as_slice(),
            &[first, third]
        );
        // handled means consumed, success or not
        for row in mock.rows("deletion_requests") {
            assert_eq!(row["processed"], json!(true));
            assert!(row["processed_at"].is_string());
        }
    }

    #[tokio::test]
    async fn unreadable_queue_is_fatal_for_the_batch_run() {
        let mock = MockBackend::new();
        mock.fail_table("deletion_requests");
        let err = workflow_over(&mock).process_queued_deletions().await.unwrap_err();
        assert!(matches!(err, BatchError::QueueReadFailed(_)));
    }

    #[tokio::test]
    async fn empty_queue_reports_nothing_to_do() {
        let mock = MockBackend::new().with_rows("deletion_requests", vec![]);
        let report = workflow_over(&mock).process_queued_deletions().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.failed, 0);
    }
}

//! Process-wide session state, owned explicitly and passed by reference.
//!
//! Consumers read the current session from a [`SessionContext`] they were
//! handed, never from a global. The context re-derives its state on every
//! backend auth transition and refuses to hold a session whose identity
//! carries the soft-delete marker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::deletion::{Actor, DeletionError, DeletionWorkflow};
use crate::models::deletion::DeletionOutcome;
use crate::models::user::{AuthUser, Session};
use crate::services::supabase::{AuthApi, AuthApiError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("this account has been deleted")]
    AccountDeleted,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no active session")]
    NotSignedIn,
    #[error(transparent)]
    Auth(AuthApiError),
    #[error("account deletion failed: {0}")]
    Deletion(#[from] DeletionError),
}

impl From<AuthApiError> for SessionError {
    fn from(err: AuthApiError) -> Self {
        match err {
            AuthApiError::InvalidCredentials => SessionError::InvalidCredentials,
            other => SessionError::Auth(other),
        }
    }
}

type Callback = Arc<dyn Fn(Option<&Session>) + Send + Sync>;
type SubscriberList = Mutex<Vec<(u64, Callback)>>;

/// Removes its callback from the context when dropped.
pub struct SessionSubscription {
    id: u64,
    subscribers: Weak<SubscriberList>,
}

impl SessionSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct SessionContext {
    auth: Arc<dyn AuthApi>,
    workflow: Arc<DeletionWorkflow>,
    // held only for state swaps, never across an await
    current: Mutex<Option<Session>>,
    subscribers: Arc<SubscriberList>,
    next_subscriber_id: AtomicU64,
}

impl SessionContext {
    pub fn new(auth: Arc<dyn AuthApi>, workflow: Arc<DeletionWorkflow>) -> Self {
        Self {
            auth,
            workflow,
            current: Mutex::new(None),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.lock().as_ref().map(|s| s.user.clone())
    }

    /// Registers `callback` for every session transition. The callback runs
    /// inline on the notifying task and must not block.
    pub fn subscribe(
        &self,
        callback: impl Fn(Option<&Session>) + Send + Sync + 'static,
    ) -> SessionSubscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        SessionSubscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    fn set_session(&self, next: Option<Session>) {
        *self.current.lock() = next.clone();
        let listeners: Vec<Callback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for listener in listeners {
            listener(next.as_ref());
        }
    }

    async fn revoke_and_clear(&self, access_token: &str) {
        if let Err(err) = self.auth.sign_out(access_token).await {
            warn!(?err, "failed to revoke session for deleted account");
        }
        self.set_session(None);
    }

    /// Exchanges credentials for a session. An identity already soft-marked
    /// for deletion is rejected with [`SessionError::AccountDeleted`]: the
    /// freshly issued session is revoked and nothing is stored, closing the
    /// window between soft mark and hard delete.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let session = self.auth.sign_in(email, password).await?;
        if session.user.is_soft_deleted() {
            warn!(user_id = %session.user.id, "sign-in for soft-deleted account rejected");
            self.revoke_and_clear(&session.access_token).await;
            return Err(SessionError::AccountDeleted);
        }
        info!(user_id = %session.user.id, "session established");
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    /// Registers a new identity. Stores the session when the backend issues
    /// one immediately; `None` means the address must be confirmed first.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, SessionError> {
        let session = self.auth.sign_up(email, password).await?;
        if let Some(session) = &session {
            self.set_session(Some(session.clone()));
        }
        Ok(session)
    }

    /// Ends the session: remote revocation is best-effort, local state is
    /// cleared and subscribers notified regardless.
    pub async fn sign_out(&self) {
        let token = self.current_session().map(|s| s.access_token);
        self.set_session(None);
        if let Some(token) = token {
            if let Err(err) = self.auth.sign_out(&token).await {
                warn!(?err, "remote sign-out failed; local session cleared anyway");
            }
        }
    }

    /// Re-derives the held identity from the backend, as on a session-change
    /// notification. A soft-deleted identity forces sign-out; a rejected
    /// token clears the session; transient errors leave it untouched.
    pub async fn refresh(&self) -> Result<Option<AuthUser>, SessionError> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        match self.auth.get_user(&session.access_token).await {
            Ok(user) if user.is_soft_deleted() => {
                warn!(user_id = %user.id, "held session belongs to a deleted account; signing out");
                self.revoke_and_clear(&session.access_token).await;
                Err(SessionError::AccountDeleted)
            }
            Ok(user) => {
                let updated = {
                    let mut guard = self.current.lock();
                    if let Some(session) = guard.as_mut() {
                        session.user = user.clone();
                    }
                    guard.clone()
                };
                self.set_session(updated);
                Ok(Some(user))
            }
            Err(AuthApiError::Unauthorized) | Err(AuthApiError::NotFound) => {
                self.set_session(None);
                Ok(None)
            }
            Err(err) => Err(SessionError::Auth(err)),
        }
    }

    /// Deletes the signed-in account through the canonical workflow, then
    /// ends the local session unconditionally, even when deletion failed
    /// partway.
    pub async fn delete_account(&self) -> Result<DeletionOutcome, SessionError> {
        let session = self.current_session().ok_or(SessionError::NotSignedIn)?;
        let actor = Actor::session(session.user.id, session.access_token.clone());
        let result = self.workflow.delete_account(&actor, session.user.id).await;
        self.set_session(None);
        Ok(result?)
    }
}

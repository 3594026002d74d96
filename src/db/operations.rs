use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::db::models::{Admin, Identity, Session, User};
use crate::db::store::Store;
use crate::error::AppError;
use crate::Result;

/// Runs a persistence call under `deadline`. Only the call is cancelled when
/// the deadline elapses; the caller decides what to do with `Timeout`.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(deadline_ms = deadline.as_millis() as u64, "Persistence call timed out");
            Err(AppError::Timeout)
        }
    }
}

/// Deadline-bounded access to the store. Cheap to clone.
#[derive(Clone)]
pub struct DbOperations {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl DbOperations {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn create_user(&self, user: &User) -> Result<()> {
        with_deadline(self.timeout, self.store.create_user(user)).await
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        with_deadline(self.timeout, self.store.get_user_by_id(id)).await
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        with_deadline(self.timeout, self.store.update_user(user)).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        with_deadline(self.timeout, self.store.list_users()).await
    }

    pub async fn create_admin(&self, admin: &Admin) -> Result<()> {
        with_deadline(self.timeout, self.store.create_admin(admin)).await
    }

    pub async fn update_admin(&self, admin: &Admin) -> Result<()> {
        with_deadline(self.timeout, self.store.update_admin(admin)).await
    }

    pub async fn list_admins(&self) -> Result<Vec<Admin>> {
        with_deadline(self.timeout, self.store.list_admins()).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        with_deadline(self.timeout, self.store.email_exists(email)).await
    }

    /// Resolves an email across both identity spaces, users first.
    pub async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>> {
        if let Some(user) = with_deadline(self.timeout, self.store.get_user_by_email(email)).await? {
            return Ok(Some(Identity::User(user)));
        }
        let admin = with_deadline(self.timeout, self.store.get_admin_by_email(email)).await?;
        Ok(admin.map(Identity::Admin))
    }

    /// Resolves a principal id across both identity spaces, users first.
    pub async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        if let Some(user) = self.get_user_by_id(id).await? {
            return Ok(Some(Identity::User(user)));
        }
        let admin = with_deadline(self.timeout, self.store.get_admin_by_id(id)).await?;
        Ok(admin.map(Identity::Admin))
    }

    pub async fn create_session(&self, session: &Session) -> Result<()> {
        with_deadline(self.timeout, self.store.create_session(session)).await
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>> {
        with_deadline(self.timeout, self.store.get_session_by_token(token)).await
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        with_deadline(self.timeout, self.store.delete_session(token)).await
    }

    pub async fn delete_session_by_id(&self, id: Uuid) -> Result<()> {
        with_deadline(self.timeout, self.store.delete_session_by_id(id)).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        with_deadline(self.timeout, self.store.cleanup_expired_sessions(Utc::now())).await
    }
}

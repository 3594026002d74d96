use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Admin, Session, User};
use crate::Result;

/// Persistence collaborator over the `users`, `admins` and `refresh_tokens`
/// collections. Every operation is atomic on its own; callers add deadlines.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Replaces the mutable profile columns and password hash of an existing user.
    async fn update_user(&self, user: &User) -> Result<()>;
    async fn list_users(&self) -> Result<Vec<User>>;

    async fn create_admin(&self, admin: &Admin) -> Result<()>;
    async fn get_admin_by_id(&self, id: Uuid) -> Result<Option<Admin>>;
    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>>;
    async fn update_admin(&self, admin: &Admin) -> Result<()>;
    async fn list_admins(&self) -> Result<Vec<Admin>>;

    /// True when either identity space already owns `email`.
    async fn email_exists(&self, email: &str) -> Result<bool>;

    async fn create_session(&self, session: &Session) -> Result<()>;
    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, token: &str) -> Result<()>;
    async fn delete_session_by_id(&self, id: Uuid) -> Result<()>;
    /// Removes sessions whose expiry is before `now`, returning how many went.
    async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{Admin, Session, User};
use crate::db::store::Store;
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// In-process store used by tests and `memory://` development runs.
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    admins: RwLock<HashMap<Uuid, Admin>>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// Emails are unique across both identity spaces.
fn email_taken(users: &HashMap<Uuid, User>, admins: &HashMap<Uuid, Admin>, email: &str) -> bool {
    users.values().any(|u| u.email == email) || admins.values().any(|a| a.email == email)
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        // Lock order is users, then admins, for both create paths.
        let mut users = self.users.write().await;
        let admins = self.admins.write().await;
        if email_taken(&users, &admins, &user.email) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        match self.users.write().await.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AppError::DatabaseError(DatabaseError::NotFound)),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn create_admin(&self, admin: &Admin) -> Result<()> {
        let users = self.users.write().await;
        let mut admins = self.admins.write().await;
        if email_taken(&users, &admins, &admin.email) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        admins.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn get_admin_by_id(&self, id: Uuid) -> Result<Option<Admin>> {
        Ok(self.admins.read().await.get(&id).cloned())
    }

    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>> {
        Ok(self
            .admins
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn update_admin(&self, admin: &Admin) -> Result<()> {
        match self.admins.write().await.get_mut(&admin.id) {
            Some(existing) => {
                *existing = admin.clone();
                Ok(())
            }
            None => Err(AppError::DatabaseError(DatabaseError::NotFound)),
        }
    }

    async fn list_admins(&self) -> Result<Vec<Admin>> {
        let mut admins: Vec<Admin> = self.admins.read().await.values().cloned().collect();
        admins.sort_by_key(|a| a.created_at);
        Ok(admins)
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        if self.users.read().await.values().any(|u| u.email == email) {
            return Ok(true);
        }
        Ok(self.admins.read().await.values().any(|a| a.email == email))
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.token) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn get_session_by_token(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }

    async fn delete_session_by_id(&self, id: Uuid) -> Result<()> {
        self.sessions.write().await.retain(|_, s| s.id != id);
        Ok(())
    }

    async fn cleanup_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use chrono::Duration;

    #[tokio::test]
    async fn test_email_exists_spans_both_spaces() {
        let store = MemoryStore::new();
        store
            .create_user(&User::new("Fan".into(), "fan@x.com".into(), "h".into()))
            .await
            .unwrap();
        store
            .create_admin(&Admin::new("Ops".into(), "ops@x.com".into(), "h".into(), Role::Admin))
            .await
            .unwrap();

        assert!(store.email_exists("fan@x.com").await.unwrap());
        assert!(store.email_exists("ops@x.com").await.unwrap());
        assert!(!store.email_exists("nobody@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_user_email_rejected() {
        let store = MemoryStore::new();
        let user = User::new("Fan".into(), "fan@x.com".into(), "h".into());
        store.create_user(&user).await.unwrap();

        let again = User::new("Other".into(), "fan@x.com".into(), "h".into());
        let err = store.create_user(&again).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::Duplicate)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_user_and_admin_with_same_email() {
        for round in 0..50 {
            let store = std::sync::Arc::new(MemoryStore::new());
            let email = format!("race{}@x.com", round);

            let user_store = store.clone();
            let user = User::new("Fan".into(), email.clone(), "h".into());
            let as_user = tokio::spawn(async move { user_store.create_user(&user).await });

            let admin_store = store.clone();
            let admin = Admin::new("Ops".into(), email.clone(), "h".into(), Role::Admin);
            let as_admin = tokio::spawn(async move { admin_store.create_admin(&admin).await });

            let results = [as_user.await.unwrap(), as_admin.await.unwrap()];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(results.iter().any(|r| matches!(
                r,
                Err(AppError::DatabaseError(DatabaseError::Duplicate))
            )));
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let live = Session::new(user_id, "live".into(), Utc::now() + Duration::days(1));
        let stale = Session::new(user_id, "stale".into(), Utc::now() - Duration::seconds(1));
        store.create_session(&live).await.unwrap();
        store.create_session(&stale).await.unwrap();

        assert_eq!(store.cleanup_expired_sessions(Utc::now()).await.unwrap(), 1);
        assert!(store.get_session_by_token("stale").await.unwrap().is_none());

        store.delete_session_by_id(live.id).await.unwrap();
        assert!(store.get_session_by_token("live").await.unwrap().is_none());

        // Deleting something that is already gone is fine.
        store.delete_session("live").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_missing_user_fails() {
        let store = MemoryStore::new();
        let user = User::new("Ghost".into(), "ghost@x.com".into(), "h".into());
        let err = store.update_user(&user).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::NotFound)));
    }
}

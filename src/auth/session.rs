use tracing::debug;
use uuid::Uuid;

use crate::db::models::Session;
use crate::db::DbOperations;
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Server-side record of issued refresh tokens. Deleting a record revokes
/// its token regardless of what the signature says.
#[derive(Clone)]
pub struct SessionStore {
    db: DbOperations,
}

impl SessionStore {
    pub fn new(db: DbOperations) -> Self {
        Self { db }
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        self.db.create_session(session).await?;
        debug!(session_id = %session.id, user_id = %session.user_id, "Session saved");
        Ok(())
    }

    /// Fails with `DatabaseError::NotFound` when no session owns `token`.
    pub async fn find_by_token(&self, token: &str) -> Result<Session> {
        self.db
            .get_session_by_token(token)
            .await?
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))
    }

    pub async fn delete_by_token(&self, token: &str) -> Result<()> {
        self.db.delete_session(token).await
    }

    pub async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        self.db.delete_session_by_id(id).await?;
        debug!(session_id = %id, "Session deleted");
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.db.cleanup_expired_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn store() -> SessionStore {
        let db = DbOperations::new(Arc::new(MemoryStore::new()), std::time::Duration::from_secs(5));
        SessionStore::new(db)
    }

    #[tokio::test]
    async fn test_find_missing_session() {
        let sessions = store();
        let err = sessions.find_by_token("nope").await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(DatabaseError::NotFound)));
    }

    #[tokio::test]
    async fn test_multiple_sessions_per_principal() {
        let sessions = store();
        let user_id = Uuid::new_v4();
        let expires = Utc::now() + Duration::days(7);
        let phone = Session::new(user_id, "phone".into(), expires);
        let laptop = Session::new(user_id, "laptop".into(), expires);
        sessions.save(&phone).await.unwrap();
        sessions.save(&laptop).await.unwrap();

        sessions.delete_by_token("phone").await.unwrap();
        assert!(sessions.find_by_token("phone").await.is_err());
        assert_eq!(sessions.find_by_token("laptop").await.unwrap().id, laptop.id);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let sessions = store();
        let old = Session::new(Uuid::new_v4(), "old".into(), Utc::now() - Duration::hours(1));
        sessions.save(&old).await.unwrap();

        assert_eq!(sessions.purge_expired().await.unwrap(), 1);
        assert!(sessions.find_by_token("old").await.is_err());
    }
}

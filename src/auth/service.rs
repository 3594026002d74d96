use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{validate_new_password, PasswordHasher};
use crate::auth::session::SessionStore;
use crate::auth::token::{TokenCodec, TokenError};
use crate::db::models::{validate_language, Admin, Identity, PublicProfile, Role, Session, User};
use crate::db::DbOperations;
use crate::error::{AppError, AuthError, DatabaseError};
use crate::tasks::{Task, TaskDispatcher};
use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub fav_club_id: Option<Uuid>,
}

impl Registration {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        validate_email(&self.email)?;
        validate_new_password(&self.password)?;
        if let Some(language) = &self.language {
            validate_language(language)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicProfile,
}

/// Normalizes and sanity-checks an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::validation("a valid email is required"))
    }
}

/// Registration, login, refresh and logout flows, plus the credential and
/// profile changes that sit next to them. Every flow is request-scoped; the
/// service itself holds no per-principal state.
pub struct AuthService {
    db: DbOperations,
    sessions: SessionStore,
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    dispatcher: Arc<TaskDispatcher>,
}

impl AuthService {
    pub fn new(
        db: DbOperations,
        codec: Arc<TokenCodec>,
        hasher: PasswordHasher,
        dispatcher: Arc<TaskDispatcher>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(db.clone()),
            db,
            codec,
            hasher,
            dispatcher,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Creates a `user` identity. No tokens are issued; the caller logs in next.
    pub async fn register(&self, input: Registration) -> Result<PublicProfile> {
        input.validate()?;
        let email = normalize_email(&input.email);

        if self.db.email_exists(&email).await? {
            return Err(AppError::EmailTaken);
        }

        let hash = self.hasher.hash_async(input.password).await?;
        let mut user = User::new(input.name.trim().to_string(), email, hash);
        user.language = input.language;
        user.fav_club_id = input.fav_club_id;

        self.db.create_user(&user).await.map_err(duplicate_as_taken)?;
        info!(user_id = %user.id, "User registered");

        self.dispatcher
            .submit_or_log(Task::SendWelcomeEmail {
                email: user.email.clone(),
                name: user.name.clone(),
            })
            .await;

        Ok(PublicProfile::from(&user))
    }

    /// Creates an `admin` identity. Only reachable behind the super-admin gate.
    pub async fn register_admin(&self, name: &str, email: &str, password: String) -> Result<PublicProfile> {
        self.create_admin(name, email, password, Role::Admin).await
    }

    /// Creates the configured super admin unless its email is already taken.
    pub async fn ensure_super_admin(&self, name: &str, email: &str, password: String) -> Result<bool> {
        match self.create_admin(name, email, password, Role::SuperAdmin).await {
            Ok(profile) => {
                info!(admin_id = %profile.id, "Bootstrapped super admin");
                Ok(true)
            }
            Err(AppError::EmailTaken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_admin(&self, name: &str, email: &str, password: String, role: Role) -> Result<PublicProfile> {
        if name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        validate_email(email)?;
        validate_new_password(&password)?;
        let email = normalize_email(email);

        if self.db.email_exists(&email).await? {
            return Err(AppError::EmailTaken);
        }

        let hash = self.hasher.hash_async(password).await?;
        let admin = Admin::new(name.trim().to_string(), email, hash, role);
        self.db.create_admin(&admin).await.map_err(duplicate_as_taken)?;
        info!(admin_id = %admin.id, role = %role, "Admin registered");

        Ok(PublicProfile::from(&admin))
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("email and password are required"));
        }
        let email = normalize_email(email);

        let identity = match self.db.find_identity_by_email(&email).await? {
            Some(identity) => identity,
            None => return Err(AuthError::InvalidCredentials.into()),
        };

        let matches = self
            .hasher
            .verify_async(password.to_string(), identity.password_hash().to_string())
            .await?;
        if !matches {
            return Err(AuthError::InvalidCredentials.into());
        }

        let principal_id = identity.id();
        let access_token = self.issue_access(principal_id, identity.role())?;
        let refresh = self.codec.issue_refresh(principal_id).map_err(token_failure)?;

        let session = Session::new(principal_id, refresh.token.clone(), refresh.expires_at);
        self.sessions.save(&session).await?;

        info!(principal_id = %principal_id, role = %identity.role(), "Login succeeded");
        self.dispatcher
            .submit_or_log(Task::LogActivity {
                principal_id,
                message: format!("User logged in: {}", identity.email()),
            })
            .await;

        Ok(LoginResult {
            access_token,
            refresh_token: refresh.token,
            user: identity.profile(),
        })
    }

    /// Exchanges a live refresh token for a new access token. The refresh
    /// token and its session are left untouched.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        if refresh_token.is_empty() {
            return Err(AppError::validation("refresh_token is required"));
        }

        // A forged token never reaches the store. An expired signature still
        // goes through the session check so the record gets cleaned up.
        match self.codec.verify_refresh(refresh_token) {
            Ok(_) | Err(TokenError::Expired) => {}
            Err(_) => return Err(AuthError::SessionRevoked.into()),
        }

        let session = match self.sessions.find_by_token(refresh_token).await {
            Ok(session) => session,
            Err(AppError::DatabaseError(DatabaseError::NotFound)) => {
                return Err(AuthError::SessionRevoked.into())
            }
            Err(e) => return Err(e),
        };

        if session.is_expired_at(Utc::now()) {
            self.sessions.delete_by_id(session.id).await?;
            info!(session_id = %session.id, "Refresh token expired, session removed");
            return Err(AuthError::RefreshExpired.into());
        }

        // Role is re-read so promotions and demotions apply immediately.
        let identity = self
            .db
            .find_identity_by_id(session.user_id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        self.issue_access(identity.id(), identity.role())
    }

    /// Deleting an absent session is not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        if refresh_token.is_empty() {
            return Err(AppError::validation("refresh_token is required"));
        }
        self.sessions.delete_by_token(refresh_token).await
    }

    pub async fn change_password(
        &self,
        principal_id: Uuid,
        current_password: &str,
        new_password: String,
    ) -> Result<()> {
        validate_new_password(&new_password)?;

        let identity = self
            .db
            .find_identity_by_id(principal_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        let matches = self
            .hasher
            .verify_async(current_password.to_string(), identity.password_hash().to_string())
            .await?;
        if !matches {
            warn!(principal_id = %principal_id, "Password change with wrong current password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let hash = self.hasher.hash_async(new_password).await?;
        match identity {
            Identity::User(mut user) => {
                user.password_hash = hash;
                self.db.update_user(&user).await?;
            }
            Identity::Admin(mut admin) => {
                admin.password_hash = hash;
                self.db.update_admin(&admin).await?;
            }
        }

        info!(principal_id = %principal_id, "Password updated");
        Ok(())
    }

    fn issue_access(&self, principal_id: Uuid, role: Role) -> Result<String> {
        self.codec.issue_access(principal_id, role).map_err(token_failure)
    }
}

fn token_failure(err: TokenError) -> AppError {
    AppError::InternalError(err.to_string())
}

// Two concurrent registrations can both pass the existence check; the unique
// index settles it.
fn duplicate_as_taken(err: AppError) -> AppError {
    match err {
        AppError::DatabaseError(DatabaseError::Duplicate) => AppError::EmailTaken,
        other => other,
    }
}

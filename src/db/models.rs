use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// A language the mobile app ships translations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const SUPPORTED_LANGUAGES: [Language; 3] = [
    Language { code: "en", name: "English" },
    Language { code: "am", name: "Amharic" },
    Language { code: "om", name: "Oromo" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(AppError::InternalError(format!("unknown role `{}`", other))),
        }
    }
}

/// A mobile app user. Lives in the `users` collection.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub language: Option<String>,
    pub fav_club_id: Option<Uuid>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            language: None,
            fav_club_id: None,
            profile_image_url: None,
            created_at: Utc::now(),
        }
    }
}

/// A dashboard administrator. Lives in the `admins` collection.
#[derive(Debug, Clone)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role,
            profile_image_url: None,
            created_at: Utc::now(),
        }
    }
}

/// Row shape of the `admins` table; the role column is stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct AdminRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AdminRow> for Admin {
    type Error = AppError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            profile_image_url: row.profile_image_url,
            created_at: row.created_at,
        })
    }
}

/// Either identity space, as resolved by email or id lookups.
#[derive(Debug, Clone)]
pub enum Identity {
    User(User),
    Admin(Admin),
}

impl Identity {
    pub fn id(&self) -> Uuid {
        match self {
            Identity::User(u) => u.id,
            Identity::Admin(a) => a.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::User(_) => Role::User,
            Identity::Admin(a) => a.role,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Identity::User(u) => &u.email,
            Identity::Admin(a) => &a.email,
        }
    }

    pub fn password_hash(&self) -> &str {
        match self {
            Identity::User(u) => &u.password_hash,
            Identity::Admin(a) => &a.password_hash,
        }
    }

    pub fn profile(&self) -> PublicProfile {
        match self {
            Identity::User(u) => PublicProfile::from(u),
            Identity::Admin(a) => PublicProfile::from(a),
        }
    }
}

/// Serialized view of an identity. Never carries the password hash; user-only
/// fields are omitted for admins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fav_club_id: Option<Uuid>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: Role::User,
            profile_image_url: user.profile_image_url.clone(),
            created_at: user.created_at,
            // Users always expose a language, even when unset.
            language: Some(user.language.clone().unwrap_or_default()),
            fav_club_id: user.fav_club_id,
        }
    }
}

impl From<&Admin> for PublicProfile {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            name: admin.name.clone(),
            email: admin.email.clone(),
            role: admin.role,
            profile_image_url: admin.profile_image_url.clone(),
            created_at: admin.created_at,
            language: None,
            fav_club_id: None,
        }
    }
}

/// Partial update of a profile. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub language: Option<String>,
    pub fav_club_id: Option<Uuid>,
    pub profile_image_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.language.is_none()
            && self.fav_club_id.is_none()
            && self.profile_image_url.is_none()
    }

    pub fn touches_user_only_fields(&self) -> bool {
        self.language.is_some() || self.fav_club_id.is_some()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("name must not be empty"));
            }
        }
        if let Some(language) = &self.language {
            validate_language(language)?;
        }
        Ok(())
    }

    pub fn apply_to_user(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.trim().to_string();
        }
        if let Some(language) = &self.language {
            user.language = Some(language.clone());
        }
        if let Some(club) = self.fav_club_id {
            user.fav_club_id = Some(club);
        }
        if let Some(url) = &self.profile_image_url {
            user.profile_image_url = Some(url.clone());
        }
    }

    pub fn apply_to_admin(&self, admin: &mut Admin) {
        if let Some(name) = &self.name {
            admin.name = name.trim().to_string();
        }
        if let Some(url) = &self.profile_image_url {
            admin.profile_image_url = Some(url.clone());
        }
    }
}

pub fn validate_language(language: &str) -> Result<(), AppError> {
    if SUPPORTED_LANGUAGES.iter().any(|l| l.code == language) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Unsupported language. Supported: {}",
            SUPPORTED_LANGUAGES
                .iter()
                .map(|l| l.code)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// Server-side record backing one refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

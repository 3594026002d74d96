use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::db::models::{
    validate_language, Identity, Language, ProfileUpdate, PublicProfile, SUPPORTED_LANGUAGES,
};
use crate::db::DbOperations;
use crate::error::AppError;
use crate::Result;

/// Profile reads and edits for the calling principal, plus the admin listings.
#[derive(Clone)]
pub struct ProfileService {
    db: DbOperations,
}

impl ProfileService {
    pub fn new(db: DbOperations) -> Self {
        Self { db }
    }

    pub async fn get_profile(&self, principal_id: Uuid) -> Result<PublicProfile> {
        Ok(self.identity(principal_id).await?.profile())
    }

    pub async fn update_profile(&self, principal: &Principal, update: ProfileUpdate) -> Result<PublicProfile> {
        update.validate()?;

        let profile = match self.identity(principal.id).await? {
            Identity::User(mut user) => {
                update.apply_to_user(&mut user);
                self.db.update_user(&user).await?;
                PublicProfile::from(&user)
            }
            Identity::Admin(mut admin) => {
                if update.touches_user_only_fields() {
                    return Err(AppError::validation(
                        "language and fav_club_id are only available to users",
                    ));
                }
                update.apply_to_admin(&mut admin);
                self.db.update_admin(&admin).await?;
                PublicProfile::from(&admin)
            }
        };

        info!(principal_id = %principal.id, "Profile updated");
        Ok(profile)
    }

    pub async fn update_language(&self, principal: &Principal, language: &str) -> Result<PublicProfile> {
        validate_language(language)?;
        self.update_profile(
            principal,
            ProfileUpdate {
                language: Some(language.to_string()),
                ..Default::default()
            },
        )
        .await
    }

    /// Clubs live in the catalog, which this service does not own; any id is
    /// stored as given.
    pub async fn update_favorite_club(&self, principal: &Principal, club_id: Uuid) -> Result<PublicProfile> {
        self.update_profile(
            principal,
            ProfileUpdate {
                fav_club_id: Some(club_id),
                ..Default::default()
            },
        )
        .await
    }

    pub fn languages(&self) -> &'static [Language] {
        &SUPPORTED_LANGUAGES
    }

    pub async fn list_users(&self) -> Result<Vec<PublicProfile>> {
        let users = self.db.list_users().await?;
        Ok(users.iter().map(PublicProfile::from).collect())
    }

    pub async fn list_admins(&self) -> Result<Vec<PublicProfile>> {
        let admins = self.db.list_admins().await?;
        Ok(admins.iter().map(PublicProfile::from).collect())
    }

    async fn identity(&self, principal_id: Uuid) -> Result<Identity> {
        self.db
            .find_identity_by_id(principal_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))
    }
}

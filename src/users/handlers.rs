use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::db::models::ProfileUpdate;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteClubRequest {
    pub fav_club_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

pub async fn get_me(
    principal: Principal,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let profile = state.profile_service.get_profile(principal.id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_me(
    principal: Principal,
    req: web::Json<ProfileUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let profile = state
        .profile_service
        .update_profile(&principal, req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_language(
    principal: Principal,
    req: web::Json<LanguageRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let profile = state
        .profile_service
        .update_language(&principal, &req.language)
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub async fn update_favorite_club(
    principal: Principal,
    req: web::Json<FavoriteClubRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let profile = state
        .profile_service
        .update_favorite_club(&principal, req.fav_club_id)
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// Public: the app shows this list before anyone logs in.
pub async fn list_languages(state: web::Data<AppState>) -> HttpResponse {
    let languages = state.profile_service.languages();
    HttpResponse::Ok().json(serde_json::json!({
        "languages": languages,
        "total": languages.len()
    }))
}

pub async fn change_password(
    principal: Principal,
    req: web::Json<PasswordChange>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    state
        .auth_service
        .change_password(principal.id, &req.current_password, req.new_password)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password updated successfully"
    })))
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let users = state.profile_service.list_users().await?;
    Ok(HttpResponse::Ok().json(users))
}

pub async fn list_admins(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let admins = state.profile_service.list_admins().await?;
    Ok(HttpResponse::Ok().json(admins))
}

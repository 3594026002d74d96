use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::service::Registration;
use crate::auth::Principal;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    req: web::Json<Registration>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let profile = state.auth_service.register(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "User registered successfully",
        "user": profile
    })))
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.auth_service.login(&req.email, &req.password).await {
        Ok(result) => Ok(HttpResponse::Ok().json(result)),
        Err(e) => {
            warn!(error = %e, "Login failed");
            Err(e)
        }
    }
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let access_token = state.auth_service.refresh(&req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(RefreshResponse { access_token }))
}

pub async fn logout(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.logout(&req.refresh_token).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

/// Mounted under the super-admin scope; the role gate has already run.
pub async fn register_admin(
    principal: Principal,
    req: web::Json<AdminRegistration>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let profile = state
        .auth_service
        .register_admin(&req.name, &req.email, req.password)
        .await?;

    info!(created_by = %principal.id, admin_id = %profile.id, "Admin created");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Admin registered successfully",
        "admin": profile
    })))
}

//! Access-control middleware.
//!
//! `AuthMiddleware` validates the `Authorization: Bearer <token>` header and
//! stores the resulting [`Principal`] in the request extensions.
//! `RoleMiddleware` then gates on the principal's role. On failure the chain
//! short-circuits with an error response and no handler runs.
//!
//! Actix applies the *last* `wrap` first, so role gates must be wrapped
//! before the authentication layer:
//!
//! ```ignore
//! web::scope("/admin")
//!     .wrap(RoleMiddleware::admin())
//!     .wrap(AuthMiddleware::new(codec))
//! ```

use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use tracing::debug;
use uuid::Uuid;

use crate::auth::token::{TokenCodec, TokenError};
use crate::db::models::Role;
use crate::error::{AppError, AuthError};

/// Identity bound to the request by `AuthMiddleware`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(req.extensions().get::<Principal>().copied().ok_or_else(|| {
            AppError::AuthError(AuthError::Unauthorized("Authentication required".into()))
        }))
    }
}

fn bearer_token(req: &ServiceRequest) -> Result<&str, AuthError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AuthError::Unauthorized("Authorization header required".into()))?;

    header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Unauthorized("Malformed authorization header".into()))
}

fn authenticate(codec: &TokenCodec, req: &ServiceRequest) -> Result<Principal, AuthError> {
    let token = bearer_token(req)?;
    let claims = codec.verify_access(token).map_err(|e| {
        debug!(error = %e, path = %req.path(), "Rejected access token");
        match e {
            TokenError::Expired => AuthError::Unauthorized("Access token expired".into()),
            _ => AuthError::Unauthorized("Invalid or expired access token".into()),
        }
    })?;

    Ok(Principal {
        id: claims.sub,
        role: claims.role,
    })
}

/// Tier 1: requires a valid access token.
pub struct AuthMiddleware {
    codec: Arc<TokenCodec>,
}

impl AuthMiddleware {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    codec: Arc<TokenCodec>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&self.codec, &req) {
            Ok(principal) => {
                req.extensions_mut().insert(principal);
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Err(e) => Box::pin(async move { Err(AppError::from(e).into()) }),
        }
    }
}

/// Which roles a gate lets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGate {
    /// `admin` or `super_admin`.
    Admin,
    /// `super_admin` only.
    SuperAdmin,
}

impl RoleGate {
    pub fn allows(&self, role: Role) -> bool {
        match self {
            RoleGate::Admin => role.is_admin(),
            RoleGate::SuperAdmin => role == Role::SuperAdmin,
        }
    }

    fn denial(&self) -> AuthError {
        match self {
            RoleGate::Admin => AuthError::Forbidden("Admin or Super Admin role required".into()),
            RoleGate::SuperAdmin => AuthError::Forbidden("Super Admin role required".into()),
        }
    }
}

/// Tiers 2 and 3: requires `AuthMiddleware` to have run and the bound role
/// to pass the gate.
pub struct RoleMiddleware {
    gate: RoleGate,
}

impl RoleMiddleware {
    pub fn admin() -> Self {
        Self { gate: RoleGate::Admin }
    }

    pub fn super_admin() -> Self {
        Self { gate: RoleGate::SuperAdmin }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RoleMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RoleMiddlewareService {
            service: Rc::new(service),
            gate: self.gate,
        }))
    }
}

pub struct RoleMiddlewareService<S> {
    service: Rc<S>,
    gate: RoleGate,
}

impl<S, B> Service<ServiceRequest> for RoleMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let principal = req.extensions().get::<Principal>().copied();
        match principal {
            Some(p) if self.gate.allows(p.role) => Box::pin(self.service.call(req)),
            Some(p) => {
                debug!(principal_id = %p.id, role = %p.role, gate = ?self.gate, "Role gate denied request");
                let err = self.gate.denial();
                Box::pin(async move { Err(AppError::from(err).into()) })
            }
            None => Box::pin(async move {
                Err(AppError::from(AuthError::Unauthorized("Authentication required".into())).into())
            }),
        }
    }
}

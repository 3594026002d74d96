//! Authentication for the fan zone server.
//!
//! Short-lived access tokens authorize requests; long-lived refresh tokens are
//! backed by a server-side session so they can be revoked.

pub mod handlers;
mod middleware;
mod password;
mod service;
mod session;
mod token;

pub use middleware::{AuthMiddleware, Principal, RoleGate, RoleMiddleware};
pub use password::{validate_new_password, PasswordHasher, MIN_PASSWORD_LEN};
pub use service::{normalize_email, AuthService, LoginResult, Registration};
pub use session::SessionStore;
pub use token::{verify, AccessClaims, IssuedRefresh, RefreshClaims, TokenCodec, TokenError};

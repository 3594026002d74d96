pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod tasks;
pub mod users;

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthMiddleware, AuthService, PasswordHasher, Principal, RoleMiddleware, TokenCodec};
pub use db::{DbOperations, MemoryStore, PgStore, Store};
pub use tasks::{NotificationHandler, Task, TaskDispatcher};
pub use users::ProfileService;

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: DbOperations,
    pub codec: Arc<TokenCodec>,
    pub auth_service: Arc<AuthService>,
    pub profile_service: ProfileService,
    pub dispatcher: Arc<TaskDispatcher>,
    pg: Option<Arc<PgStore>>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let (store, pg): (Arc<dyn Store>, Option<Arc<PgStore>>) = if config.database.is_memory() {
            info!("Using in-memory store");
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            (store, None)
        } else {
            let pg = Arc::new(
                PgStore::connect(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.timeout(),
                )
                .await?,
            );
            pg.migrate().await?;
            info!("Connected to Postgres, migrations applied");
            let store: Arc<dyn Store> = pg.clone();
            (store, Some(pg))
        };

        Self::with_store(config, store, pg)
    }

    /// Builds the state around an existing store.
    pub fn with_store(config: Settings, store: Arc<dyn Store>, pg: Option<Arc<PgStore>>) -> Result<Self> {
        let db = DbOperations::new(store, config.database.timeout());
        let codec = Arc::new(TokenCodec::from_config(&config.auth));
        let hasher = PasswordHasher::from_config(&config.auth)?;
        let dispatcher = Arc::new(TaskDispatcher::start(
            config.tasks.clone(),
            Arc::new(NotificationHandler),
        )?);

        let auth_service = Arc::new(AuthService::new(
            db.clone(),
            codec.clone(),
            hasher,
            dispatcher.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            profile_service: ProfileService::new(db.clone()),
            db,
            codec,
            auth_service,
            dispatcher,
            pg,
        })
    }

    /// Creates the configured super admin if nobody owns that email yet.
    pub async fn bootstrap(&self) -> Result<()> {
        if let Some(admin) = &self.config.auth.bootstrap_super_admin {
            let created = self
                .auth_service
                .ensure_super_admin(&admin.name, &admin.email, admin.password.clone())
                .await?;
            if !created {
                info!(email = %admin.email, "Super admin already present");
            }
        }
        Ok(())
    }

    /// Deletes expired sessions every `every`, starting immediately.
    pub fn spawn_session_sweep(&self, every: Duration) -> JoinHandle<()> {
        let sessions = self.auth_service.sessions().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match sessions.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Purged expired sessions"),
                    Err(e) => error!(error = %e, "Session sweep failed"),
                }
            }
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        let dispatcher = self.dispatcher.clone();
        tokio::task::spawn_blocking(move || dispatcher.join()).await?;

        if let Some(pg) = &self.pg {
            pg.close().await;
        }
        info!("Shutdown complete");
        Ok(())
    }
}

/// Mounts every route. Admin scopes wrap the role gate before the token check
/// so authentication runs first.
pub fn configure_routes(cfg: &mut web::ServiceConfig, codec: Arc<TokenCodec>) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .route("/health", web::get().to(health_check))
    .route("/languages", web::get().to(users::handlers::list_languages))
    .service(
        web::scope("/auth")
            .route("/register", web::post().to(auth::handlers::register))
            .route("/login", web::post().to(auth::handlers::login))
            .route("/refresh", web::post().to(auth::handlers::refresh))
            .route("/logout", web::post().to(auth::handlers::logout)),
    )
    .service(
        web::scope("/users")
            .wrap(AuthMiddleware::new(codec.clone()))
            .route("/me", web::get().to(users::handlers::get_me))
            .route("/me", web::put().to(users::handlers::update_me))
            .route("/me/language", web::patch().to(users::handlers::update_language))
            .route(
                "/me/favorite-club",
                web::patch().to(users::handlers::update_favorite_club),
            )
            .route("/me/password", web::put().to(users::handlers::change_password)),
    )
    .service(
        web::scope("/admin")
            .wrap(RoleMiddleware::admin())
            .wrap(AuthMiddleware::new(codec.clone()))
            .route("/users", web::get().to(users::handlers::list_users)),
    )
    .service(
        web::scope("/super-admin")
            .wrap(RoleMiddleware::super_admin())
            .wrap(AuthMiddleware::new(codec))
            .route("/register-admin", web::post().to(auth::handlers::register_admin))
            .route("/admins", web::get().to(users::handlers::list_admins)),
    );
}

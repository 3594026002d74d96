use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use dotenv::dotenv;
use fanzone_server::config::CorsConfig;
use fanzone_server::{configure_routes, AppError, AppState, Settings};
use std::net::TcpListener;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn build_cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // Same-origin only
        return Cors::default();
    }

    let cors = if config.allow_any_origin {
        Cors::default().allow_any_origin()
    } else {
        config
            .allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> fanzone_server::Result<()> {
    // .env.local wins over .env; neither is required
    dotenv::from_filename(".env.local").ok();
    dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new()?;
    info!(environment = %config.environment, "Configuration loaded successfully");

    let state = AppState::new(config.clone()).await?;
    if let Err(e) = state.bootstrap().await {
        warn!(error = %e, "Super admin bootstrap failed");
    }

    let sweep = state.spawn_session_sweep(Duration::from_secs(
        config.auth.session_cleanup_interval_secs.max(1),
    ));

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let data = web::Data::new(state.clone());
    let codec = state.codec.clone();
    let cors_config = config.cors.clone();

    HttpServer::new(move || {
        let codec = codec.clone();
        App::new()
            .wrap(build_cors(&cors_config))
            .app_data(data.clone())
            .configure(move |cfg| configure_routes(cfg, codec))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    info!("HTTP server stopped, stopping background workers");
    sweep.abort();
    state.shutdown().await?;

    Ok(())
}

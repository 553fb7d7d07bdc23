use std::sync::Arc;

use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gated_notes_gate::{
    config::GateConfig, metrics::register_metrics, routes, state::AppState, LnurlProvider,
    SqliteGateStore,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GateConfig::from_env().expect("Failed to load configuration");
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let rate_limit_rpm = config.rate_limit_rpm;

    tracing::info!("Starting gated-notes-gate on port {}", port);
    tracing::info!("Gate endpoint: {}", config.endpoint);
    if config.dev_mode {
        tracing::warn!("GATE_DEV_MODE=true, production checks are relaxed");
    }

    let store = SqliteGateStore::open(&config.db_path).expect("Failed to open gate database");
    tracing::info!("Database initialized at: {}", config.db_path);

    let provider = LnurlProvider::new().expect("Failed to create LNURL provider");

    register_metrics();

    let state = web::Data::new(AppState::new(config, Arc::new(store), provider));

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(u64::from(rate_limit_rpm))
        .finish()
        .expect("Failed to create rate limiter config");

    HttpServer::new(move || {
        let cors = gated_notes_gate::cors::build_cors(&allowed_origins);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Governor::new(&governor_conf))
            .configure(routes::configure::<LnurlProvider>)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

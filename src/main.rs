//! BharatTrips - property booking marketplace backend

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bharattrips::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db,
    services::{create_mailer, AuthRateLimiter, Services, UserService},
};

/// How often expired sessions, codes and rate-limit windows are purged
const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bharattrips=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting BharatTrips...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let cache = create_cache(&config.cache);
    let mailer = create_mailer(&config.email)?;
    let services = Services::new(pool, &config, mailer, cache);
    tracing::info!("Services initialized");

    spawn_cleanup(services.users.clone(), services.rate_limiter.clone());

    let state = AppState::new(services, &config);
    let app = api::build_router(state, &config)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically purge expired sessions and codes and prune rate-limit windows
fn spawn_cleanup(users: Arc<UserService>, limiter: Arc<AuthRateLimiter>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match users.cleanup_expired().await {
                Ok((sessions, codes)) if sessions + codes > 0 => {
                    tracing::info!("Purged {} expired session(s) and {} code(s)", sessions, codes);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Cleanup of expired sessions failed: {}", e),
            }
            limiter.cleanup().await;
        }
    });
}

use std::sync::Arc;

use realtors::core::auth::{AuthService, JwtConfig, JwtService};
use realtors::core::config::Config;
use realtors::core::db::{
    DbConfig, PasswordResetRepository, PropertyRepository, SESSION_SWEEP_INTERVAL,
    SessionRepository, SessionSweeper, UnitRepository, UserRepository,
    create_pool_with_migrations,
};
use realtors::core::graphql::build_schema;
use realtors::core::listings::ListingService;
use realtors::core::mailer::LogMailer;
use realtors::core::server::{AppState, ServerConfig, run_server};
use realtors::core::storage::ImageStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Config loaded: database={}, jwt_secret={}, environment={:?}",
        config.has_database(),
        config.has_jwt_secret(),
        config.environment
    );

    let db_config = DbConfig::new(config.require_database_url()?).with_env_overrides();
    let pool = create_pool_with_migrations(&db_config).await?;
    tracing::info!("Database ready, migrations applied");

    let sweeper =
        SessionSweeper::new(SessionRepository::new(pool.clone()), SESSION_SWEEP_INTERVAL).start();

    let jwt = JwtService::new(JwtConfig::new(config.require_jwt_secret()?));
    let images = ImageStore::new(config.storage_path.clone());
    tokio::fs::create_dir_all(images.storage_dir()).await?;

    let auth = AuthService::new(
        UserRepository::new(pool.clone()),
        SessionRepository::new(pool.clone()),
        PasswordResetRepository::new(pool.clone()),
        jwt,
        images.clone(),
        Arc::new(LogMailer::new(config.mail_from.clone())),
    );
    let listings = ListingService::new(
        UserRepository::new(pool.clone()),
        PropertyRepository::new(pool.clone()),
        UnitRepository::new(pool.clone()),
        images.clone(),
    );

    let schema = build_schema(auth.clone(), listings, config.environment);
    let state = AppState {
        schema,
        auth,
        pool,
        images,
    };

    let server_config = ServerConfig {
        bind_addr: config.bind_addr()?,
        cors_permissive: config.cors_permissive,
    };
    run_server(state, server_config).await?;
    sweeper.abort();

    Ok(())
}

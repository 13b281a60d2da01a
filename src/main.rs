use expense_tracker::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    session::{PostgresSessionStore, SessionStore, SessionStoreState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired sessions are swept from the store.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// main
///
/// Entry point: configuration, logging, database and migrations, session store, then the HTTP
/// server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise a verbose default for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "expense_tracker=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: pretty output for humans.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("FATAL: Failed to run database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool.clone())) as RepositoryState;

    // 5. Session Store
    // Sessions live in Postgres; a background task drops the expired ones.
    let session_store = Arc::new(PostgresSessionStore::new(pool)) as SessionStoreState;
    tokio::spawn(purge_sessions(session_store.clone()));

    // 6. Unified State Assembly
    let addr = config.addr.clone();
    let app_state = AppState::new(repo, session_store, config)
        .expect("FATAL: Failed to compile templates.");

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {addr}: {e}"));

    tracing::info!("Listening on {}", addr);
    tracing::info!("OpenAPI document available at: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server error");
}

async fn purge_sessions(store: SessionStoreState) {
    let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
    loop {
        interval.tick().await;
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(removed) => tracing::debug!(removed, "purged expired sessions"),
            Err(e) => tracing::warn!(error = %e, "session purge failed"),
        }
    }
}

//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{InMemoryUserStore, JsonFileSink, PgSnapshotSink},
    config::{AdminBootstrap, Config},
    error::ApiError,
    web::{auth::hash_password, build_router, state::AppState, sweeper::sweep_process},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use chrono::Utc;
use review_core::domain::Role;
use review_core::ports::{PortError, SnapshotSink, UserService};
use review_core::store::ReviewStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Creates the configured admin account unless one already uses that email.
async fn ensure_admin(users: &dyn UserService, admin: &AdminBootstrap) -> Result<(), ApiError> {
    match users.get_user_by_email(&admin.email).await {
        Ok(_) => Ok(()),
        Err(PortError::NotFound(_)) => {
            let password_hash = hash_password(&admin.password)?;
            let user = users
                .create_user_with_email(
                    &admin.email,
                    &password_hash,
                    &admin.display_name,
                    Role::Admin,
                )
                .await?;
            info!("Bootstrapped admin account {}", user.user_id);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Pick the Snapshot Sink ---
    let sink: Arc<dyn SnapshotSink> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let pg_sink = PgSnapshotSink::new(db_pool);
            info!("Running database migrations...");
            pg_sink.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(pg_sink)
        }
        None => {
            info!("Storing snapshots under {}", config.data_dir.display());
            Arc::new(JsonFileSink::new(&config.data_dir).await?)
        }
    };

    // --- 3. Restore the Stores ---
    let store = Arc::new(
        ReviewStore::open(
            sink.clone(),
            chrono::Duration::hours(config.session_expiry_hours),
            Utc::now(),
        )
        .await?,
    );
    let users = Arc::new(InMemoryUserStore::open(sink).await?);
    if let Some(admin) = &config.admin {
        ensure_admin(users.as_ref(), admin).await?;
    }

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store: store.clone(),
        users,
        config: config.clone(),
    });

    // --- 5. Start the Session Sweeper ---
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_process(
        store,
        Duration::from_secs(config.sweep_interval_secs),
        shutdown.clone(),
    ));

    // --- 6. Create the Web Router ---
    let origin = config.frontend_url.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid FRONTEND_URL '{}': {}", config.frontend_url, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(api_lib::web::middleware::SESSION_HEADER),
        ]);
    let app = build_router(app_state).layer(cors);

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Session sweeper panicked: {}", e);
    }
    Ok(())
}

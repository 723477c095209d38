//! Retail banking back office - main application entry point
//!
//! A multi-tenant REST API for bank staff: customers, accounts and
//! transactions, cards, credit assessment, branches, approval workflows,
//! alerts, audit logs, reconciliation and encrypted statements.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing, resolving to a tenant and role
//! - **Format**: JSON requests/responses in a uniform envelope
//!
//! # Startup Flow
//!
//! 1. Load and validate configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the 3DS and SMS clients
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod clients;
mod config;
mod crypto;
mod db;
mod documents;
mod error;
mod handlers;
mod luhn;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use crate::{
    clients::{sms::SmsClient, three_ds::ThreeDsClient},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let three_ds = ThreeDsClient::new(&config.three_ds_api_url, &config.three_ds_api_key)?;
    let sms = SmsClient::from_config(&config)?;
    if !sms.is_enabled() {
        tracing::warn!("SMS_API_URL not set, SMS notifications will only be logged");
    }

    let addr = format!("0.0.0.0:{}", config.server_port);
    let app = routes::router(AppState::new(pool, config, three_ds, sms));

    // Bind to network address and start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

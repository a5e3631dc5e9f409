//! # Haven PMS API
//!
//! HTTP server for the billing and notification pipeline.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Haven API Server                                 │
//! │                                                                         │
//! │  Portals ───► /api/* ──────────► handlers ───► haven-core / haven-db  │
//! │                                      │                                  │
//! │  Cron ──────► /internal/jobs/* ───► haven-jobs ───► SQLite             │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                          SMTP relay / SMS gateway                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod auth;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use haven_db::{Database, DbConfig};
use haven_jobs::{
    ChannelSender, DrainWorker, HttpSmsSender, JobsConfig, SmsConfig, SmtpConfig, SmtpEmailSender,
};

use crate::config::ApiConfig;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: ApiConfig,
    pub jobs: JobsConfig,
    pub worker: DrainWorker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("Starting Haven PMS API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        port = config.http_port,
        database = %config.database_path,
        "Configuration loaded"
    );

    // Connect to SQLite (creates the file and runs migrations)
    let db = Database::new(DbConfig::new(&config.database_path)).await?;
    info!("Database ready");

    // Build delivery channels from what is configured; a channel without
    // credentials stays off and its queue items fail with a clear error.
    let senders = build_senders(&config)?;

    let jobs = JobsConfig::default();
    let worker = DrainWorker::new(db.clone(), jobs.clone(), senders);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        jobs,
        worker,
    });

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Starting HTTP server");

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_senders(
    config: &ApiConfig,
) -> Result<Vec<Arc<dyn ChannelSender>>, Box<dyn std::error::Error>> {
    let mut senders: Vec<Arc<dyn ChannelSender>> = Vec::new();

    match &config.smtp_host {
        Some(host) => {
            let sender = SmtpEmailSender::new(&SmtpConfig {
                host: host.clone(),
                port: config.smtp_port,
                username: config.smtp_username.clone(),
                password: config.smtp_password.clone(),
                from_address: config.smtp_from_address.clone(),
                from_name: config.smtp_from_name.clone(),
            })?;
            info!(%host, "Email channel configured");
            senders.push(Arc::new(sender));
        }
        None => warn!("SMTP_HOST not set; email delivery disabled"),
    }

    match (&config.sms_gateway_url, &config.sms_api_key) {
        (Some(url), Some(key)) => {
            let sender = HttpSmsSender::new(&SmsConfig {
                gateway_url: url.clone(),
                api_key: key.clone(),
            });
            info!(gateway = %url, "SMS channel configured");
            senders.push(Arc::new(sender));
        }
        (Some(_), None) => warn!("SMS_GATEWAY_URL set without SMS_API_KEY; SMS delivery disabled"),
        (None, _) => warn!("SMS_GATEWAY_URL not set; SMS delivery disabled"),
    }

    Ok(senders)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

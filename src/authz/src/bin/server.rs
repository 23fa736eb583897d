//! # Authorization Plugin Server
//!
//! Serves the container engine's authorization plugin protocol over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /Plugin.Activate` - Handshake, advertises `authz`
//! - `POST /AuthZPlugin.AuthZReq` - Pre-call authorization
//! - `POST /AuthZPlugin.AuthZRes` - Post-call ownership bookkeeping
//! - `GET /health` - Health check
//!
//! ## Configuration
//!
//! TOML file given by `--config` / `HBM_CONFIG`, with overrides:
//! - `HBM_LISTEN_ADDR` - Listen address (default: 127.0.0.1:8180)
//! - `HBM_DATABASE_URL` - PostgreSQL connection string
//! - `RUST_LOG` - Log filter (default: configured log level)

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    serve, Router,
};
use clap::{Parser, Subcommand};
use hbm_authz::{
    ActivateResponse, Dispatcher, InMemoryOwnershipStore, InMemoryPolicyStore, OwnershipStore,
    PluginConfig, PluginRequest, PluginResponse, PolicyStore, StorageBackend, StorageConfig,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Authorization plugin CLI
#[derive(Parser)]
#[command(name = "hbm-authz-plugin")]
#[command(about = "Authorization plugin for the container engine API")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "HBM_CONFIG")]
    config: Option<PathBuf>,

    /// Override listen address
    #[arg(long)]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and exit
    CheckConfig,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    start_time: std::time::Instant,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// POST /Plugin.Activate
async fn activate() -> Json<ActivateResponse> {
    Json(ActivateResponse::default())
}

/// POST /AuthZPlugin.AuthZReq
async fn authz_request(
    State(state): State<AppState>,
    Json(req): Json<PluginRequest>,
) -> Json<PluginResponse> {
    let verdict = state.dispatcher.handle_pre_call(&req).await;
    if !verdict.allow {
        info!(
            user = %req.user,
            method = %req.request_method,
            uri = %req.request_uri,
            "call denied"
        );
    }
    Json(verdict.into())
}

/// POST /AuthZPlugin.AuthZRes
async fn authz_response(
    State(state): State<AppState>,
    Json(req): Json<PluginRequest>,
) -> Json<PluginResponse> {
    Json(state.dispatcher.handle_post_call(&req).await.into())
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: hbm_authz::VERSION.to_string(),
    })
}

fn create_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route("/Plugin.Activate", post(activate))
        .route("/AuthZPlugin.AuthZReq", post(authz_request))
        .route("/AuthZPlugin.AuthZRes", post(authz_response))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace))
        .with_state(state)
}

async fn build_stores(
    storage: &StorageConfig,
) -> Result<(Arc<dyn PolicyStore>, Arc<dyn OwnershipStore>)> {
    match storage.backend {
        StorageBackend::Memory => {
            warn!("using in-memory stores; every image pull will be denied until grants are added");
            let policies: Arc<dyn PolicyStore> = Arc::new(InMemoryPolicyStore::new());
            let owners: Arc<dyn OwnershipStore> = Arc::new(InMemoryOwnershipStore::new());
            Ok((policies, owners))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            use hbm_authz::ownership::PostgresOwnershipStore;
            use hbm_authz::policy::PostgresPolicyStore;

            let policies = PostgresPolicyStore::connect(storage)
                .await
                .context("Failed to connect policy store")?;
            if storage.run_migrations {
                policies
                    .run_migrations()
                    .await
                    .context("Failed to run migrations")?;
            }
            let owners: Arc<dyn OwnershipStore> =
                Arc::new(PostgresOwnershipStore::from_pool(policies.pool().clone()));
            let policies: Arc<dyn PolicyStore> = Arc::new(policies);
            Ok((policies, owners))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("postgres backend requested but the `postgres` feature is disabled")
        }
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PluginConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PluginConfig::default(),
    };
    config.apply_env();
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }

    let log_level = if cli.verbose { "debug" } else { config.server.log_level.as_str() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("Invalid configuration")?;

    if let Some(Command::CheckConfig) = cli.command {
        info!("Configuration OK");
        return Ok(());
    }

    info!("Starting HBM authorization plugin v{}", hbm_authz::VERSION);
    info!("  Listen: {}", config.server.listen_addr);
    info!("  Storage: {:?}", config.storage.backend);

    let (policy_store, ownership_store) = build_stores(&config.storage).await?;
    let dispatcher = Dispatcher::from_config(&config.authorization, policy_store, ownership_store)
        .context("Failed to build dispatcher")?;

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        start_time: std::time::Instant::now(),
    };

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    serve(listener, create_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

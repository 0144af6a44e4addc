// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::application::frame_repository::FrameRepository;
use crate::application::refresh_service::RefreshService;
use crate::infrastructure::auth::{hash_password, TokenService};
use crate::infrastructure::catalog_loader::load_catalog;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::file_store::FileDashboardStore;
use crate::infrastructure::rate_limit::LoginRateLimiter;
use crate::infrastructure::secret_box::{generate_key, SecretBox};
use crate::infrastructure::server_registry::ServerRegistry;
use crate::infrastructure::upstream_repository::UpstreamRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[derive(Parser, Debug)]
#[command(name = "lora-dashboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a bcrypt hash for auth.password_hash
    HashPassword { password: String },
    /// Print a random base64 key for auth.encryption_key
    GenerateKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Some(Command::HashPassword { password }) => {
            println!("{}", hash_password(&password)?);
            return Ok(());
        }
        Some(Command::GenerateKey) => {
            println!("{}", generate_key());
            return Ok(());
        }
        None => {}
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lora_dashboard=debug")),
        )
        .init();

    // Load configuration
    let config = load_app_config()?;
    let catalog = Arc::new(load_catalog(&config.storage.catalog_dir)?);

    // Create repositories (infrastructure layer)
    let upstream = Arc::new(UpstreamRepository::new(
        config.upstream.host,
        config.upstream.token,
        Duration::from_secs(config.upstream.timeout_secs),
    )?);
    let frames: Arc<dyn FrameRepository> = upstream.clone();
    let store = Arc::new(FileDashboardStore::new(&config.storage.dashboards_dir).await?);
    let secrets = SecretBox::from_base64_key(&config.auth.encryption_key)?;
    let servers = Arc::new(ServerRegistry::open(&config.storage.servers_file, secrets).await?);
    let tokens = TokenService::new(
        config.auth.username,
        config.auth.password_hash,
        &config.auth.jwt_secret,
        config.auth.token_ttl_secs,
    )?;
    let login_limiter = Arc::new(LoginRateLimiter::new(
        config.auth.login_max_attempts,
        Duration::from_secs(config.auth.login_window_secs),
    ));

    // Create services (application layer)
    let dashboard_service = DashboardService::new(
        store,
        catalog.clone(),
        Duration::from_millis(config.dashboard.save_debounce_ms),
    );
    let refresh_service = RefreshService::new(
        frames.clone(),
        catalog.clone(),
        config.upstream.frame_query,
    );

    // Create application state
    let state = Arc::new(AppState {
        catalog,
        dashboard_service: dashboard_service.clone(),
        refresh_service,
        frames,
        upstream,
        tokens,
        login_limiter,
        servers,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.server.bind).await?;
    tracing::info!("Starting lora-dashboard service on {}", config.server.bind);

    // Client addresses key the login rate limit
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Pending debounced saves are written before exit
    dashboard_service.flush_all().await?;
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

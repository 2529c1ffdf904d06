//! `placementd`: the placement portal server binary.
//!
//! Usage:
//!   placementd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/placement/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use allocation::{AllocationModule, ChangeFeed};
use config::ServerConfig;
use placement_core::Module;

/// Placement portal server.
#[derive(Parser, Debug)]
#[command(name = "placementd", about = "Placement portal server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides the config file and 0.0.0.0:8080).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Load server configuration.
    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    let core_config = server_config.service_config(cli.listen.as_deref());

    // Initialize storage.
    if let Some(ref data_dir) = core_config.data_dir {
        std::fs::create_dir_all(data_dir)?;
    }
    let sql: Arc<dyn placement_sql::SQLStore> = Arc::new(
        placement_sql::SqliteStore::open(
            &core_config.resolve_sqlite_path(),
            core_config.busy_timeout,
        )
        .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    // Change feed: log every committed change.
    let feed = Arc::new(ChangeFeed::new());
    feed.subscribe(None, |event: &allocation::ChangeEvent| {
        debug!(
            table = ?event.table,
            op = ?event.op,
            college_id = %event.college_id,
            record_id = %event.record_id,
            "ledger change"
        );
    });

    let allocation_module =
        AllocationModule::new(Arc::clone(&sql), feed, server_config.ledger.clone())
            .map_err(|e| anyhow::anyhow!("failed to initialize allocation module: {}", e))?;
    info!(
        record_exhaustion = server_config.ledger.record_exhaustion,
        "Allocation module initialized"
    );

    let module_routes = vec![(allocation_module.name(), allocation_module.routes())];
    let app = routes::build_router(module_routes);

    // Start server.
    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("Placement server listening on {}", core_config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Placement server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

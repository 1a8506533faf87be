//! tuffyd - the tuffy command host daemon.

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tuffy::config::{self, Config};
use tuffy::gateway::Gateway;
use tuffy::lifecycle::ModuleHost;
use tuffy::loader::{CatalogLoader, LoadedModules};
use tuffy::modules::Catalog;
use tuffy::publish::{CommandTable, TableSync};
use tuffy::{http, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("TUFFY_LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {config_path}",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        modules = %config.modules.directory,
        "Starting tuffy"
    );

    // Prometheus metrics are optional.
    // Convention: metrics.port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.metrics.port;
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    // Bind before any module task exists.
    let table = CommandTable::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let gateway = Gateway::bind(
        config.listen.address,
        table.clone(),
        &config.server.command_prefix,
        shutdown_rx,
    )
    .await?;

    // Module lifecycle: initial load, then the watcher task.
    let live = LoadedModules::new();
    let layout = config.modules.layout();
    let loader = CatalogLoader::new(layout.clone(), Catalog::builtin(), live.clone());
    let sync = TableSync::new(live, table);
    let host = ModuleHost::startup(
        layout,
        Arc::new(loader),
        Arc::new(sync),
        config.modules.host_options(),
    )
    .await?;

    let gateway = tokio::spawn(gateway.run());

    info!(entry_points = ?Catalog::builtin().names(), "tuffy ready");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal; shutting down"),
    }

    let _ = shutdown_tx.send(true);
    match host.shutdown().await {
        Ok(registry) => info!(modules = registry.len(), "Module watcher joined"),
        Err(e) => warn!(error = %e, "Module watcher task failed"),
    }
    match gateway.await {
        Ok(Err(e)) => warn!(error = %e, "Gateway exited with error"),
        Err(e) => warn!(error = %e, "Gateway task failed"),
        Ok(Ok(())) => {}
    }

    info!("Shutdown complete");
    Ok(())
}

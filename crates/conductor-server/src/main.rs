//! Conductor: intent orchestration server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use conductor_core::ConductorConfig;
use conductor_runtime::{recover_interrupted, spawn_retention_task};
use conductor_server::{build_router, open_store, AppState};

/// Upper bound on the gap between retention sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

fn resolve_data_dir() -> PathBuf {
    std::env::var("CONDUCTOR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("Conductor: intent orchestration server");
    println!();
    println!("Usage: conductor [command]");
    println!();
    println!("Commands:");
    println!("  (none)     Start the server");
    println!("  help       Show this help message");
    println!();
    println!("Configuration is read from the environment: PORT, CONDUCTOR_DATA_DIR,");
    println!("CONDUCTOR_STORE, SYNC_DEADLINE_MS, DEFAULT_MODE, N8N_WEBHOOK_BASE,");
    println!("FLOW_TIMEOUT_SECS, CALLBACK_TIMEOUT_SECS, CALLBACK_MAX_ATTEMPTS,");
    println!("CALLBACK_BACKOFF_MS, HMAC_SECRET, HMAC_HEADER, JOB_RETENTION_HOURS,");
    println!("SSH_ALLOWED_HOSTS, RUST_LOG.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}. Use 'conductor help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    let config = ConductorConfig::from_env(&data_dir)?;
    let port = config.port;
    info!(
        "Store backend: {:?}, data directory: {}",
        config.store_backend,
        data_dir.display()
    );

    let store = open_store(&config).map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    recover_interrupted(store.as_ref())?;

    if let Some(retention) = config.job_retention() {
        spawn_retention_task(store.clone(), retention, retention.min(MAX_SWEEP_INTERVAL));
    }

    let state = Arc::new(AppState::with_builtin_tools(config, store)?);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Conductor listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

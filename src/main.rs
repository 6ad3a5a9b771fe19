use axum::Router;
use clap::Parser;
use tokio::signal;
use tracing::info;

use wallet_ledger_api::config::{LogFormat, StorageBackend};
use wallet_ledger_api::{database, router, AppState, Config, MemoryLedgerStore, PgLedgerStore};

/// Wallet ledger HTTP service
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Listen port (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Storage backend: postgres or memory (overrides STORAGE_BACKEND)
    #[arg(long)]
    storage: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(storage) = cli.storage.as_deref() {
        config.storage = StorageBackend::from_str(storage)
            .ok_or_else(|| anyhow::anyhow!("Unknown storage backend {:?}", storage))?;
    }

    init_tracing(config.log_format);
    info!("Starting wallet ledger API ({:?} storage)...", config.storage);

    let app = match config.storage {
        StorageBackend::Postgres => {
            let db_pool = database::new_pool(&config.database_url, config.db_max_connections).await?;
            info!("Database connection pool created");
            database::run_migrations(&db_pool).await?;
            router(AppState::new(PgLedgerStore::new(db_pool, config.lock_timeout)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; balances are lost on restart");
            router(AppState::new(MemoryLedgerStore::new(config.lock_timeout)))
        }
    };

    serve(app, config.port).await
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wallet_ledger_api=debug,tower_http=debug".into());

    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn serve(app: Router, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    // In-flight requests finish; anything cut off mid-transaction rolls back when dropped
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

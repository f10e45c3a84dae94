//! Tekton DAG reporting gateway — HTTP entry point.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use dag_reporting_server::config::{self, GatewayConfig};
use dag_reporting_server::metrics;
use dag_reporting_server::routes::{self, GatewayState};

#[derive(Parser)]
#[command(name = "dag-reporting", about = "Tekton DAG reporting and trigger API")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "4000")]
    port: u16,

    /// Checkout of the pipeline repository (holds stacks/ and scripts/)
    #[arg(long, env = "REPO_ROOT")]
    repo_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let repo_root = config::resolve_repo_root(cli.repo_root, &cwd);
    let gateway_config = GatewayConfig::from_env(repo_root);

    tracing::info!(
        namespace = %gateway_config.namespace,
        repo_root = %gateway_config.repo_root.display(),
        "Starting reporting gateway..."
    );

    metrics::init_metrics();

    let app = routes::gateway_router(GatewayState::from_config(gateway_config));

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Reporting API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

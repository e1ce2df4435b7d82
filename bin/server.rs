// Gradebook - Web Server
// REST API with Axum over a JSON-file backed gradebook

use anyhow::{Context, Result};
use gradebook::api::{router, AppState};
use gradebook::{Config, GradebookService};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("Environment misconfigured")?;

    info!(data_file = %config.data_file.display(), "Loading gradebook...");
    let service = GradebookService::open(config.storage());
    info!(students = service.book().len(), "Gradebook ready");

    let app = router(AppState::new(service, &config.web_dir));

    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;

    info!("Server running on http://{address}");
    info!("   API: http://{address}/rankings");
    info!("   UI:  http://{address}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

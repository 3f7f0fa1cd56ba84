use std::net::SocketAddr;
use std::sync::Arc;

use reports::ReportBuilder;
use scenescan_api::{AppState, GeminiClient, ServiceConfig, app};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scenescan_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::debug!("Loaded configuration: {:?}", config);
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; only tampering analysis will succeed");
    }

    let reports = ReportBuilder::new(&config.report_dir).with_retention(config.report_ttl);
    match reports.sweep_expired() {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Removed {} expired reports", removed),
        Err(e) => tracing::warn!("Could not sweep expired reports: {}", e),
    }

    let state = Arc::new(AppState {
        describer: GeminiClient::new(config.gemini.clone())?,
        reports,
        render_remote_failures: config.render_remote_failures,
    });
    let app = app(state, config.max_upload_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("SceneScan API Server");
    tracing::info!("Endpoint: POST /api/analyze - Upload an image and get an analysis report");
    tracing::info!("Reports are written to {}", config.report_dir.display());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            let fallback = config.port.wrapping_add(1);
            tracing::warn!("Port {} in use, trying port {}...", config.port, fallback);
            tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], fallback))).await?
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Server ready on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

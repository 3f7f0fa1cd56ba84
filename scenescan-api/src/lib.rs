pub mod analysis;
pub mod config;
pub mod describer;
pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// Re-export key types
pub use analysis::{PipelineError, PipelineOutcome, dispatch, run_pipeline};
pub use config::ServiceConfig;
pub use describer::{Describer, GeminiClient, RemoteAnalysisError};
pub use error::ApiError;
pub use handlers::AppState;
pub use models::*;

pub fn app<D>(state: Arc<AppState<D>>, max_upload_bytes: usize) -> Router
where
    D: Describer + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/analyze", post(handlers::analyze::<D>))
        .route("/api/reports/:id", get(handlers::download_report::<D>))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

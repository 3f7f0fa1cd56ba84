use std::sync::Arc;

use analyzers::AnalysisMode;
use analyzers::brightness_analyzer::HEURISTIC_DISCLAIMER;
use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use parsers::image_parser::RawUpload;
use reports::ReportBuilder;
use serde_json::json;
use uuid::Uuid;

use crate::analysis::run_pipeline;
use crate::describer::Describer;
use crate::error::ApiError;
use crate::models::AnalysisResponse;

pub struct AppState<D> {
    pub describer: D,
    pub reports: ReportBuilder,
    pub render_remote_failures: bool,
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "SceneScan API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Forensic image analysis with downloadable PDF reports",
        "endpoints": {
            "analyze": "POST /api/analyze (multipart: file, mode)",
            "report": "GET /api/reports/{id}"
        },
        "modes": AnalysisMode::ALL,
        "tampering_disclaimer": HEURISTIC_DISCLAIMER
    }))
}

pub async fn analyze<D>(
    State(state): State<Arc<AppState<D>>>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError>
where
    D: Describer + Send + Sync + 'static,
{
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut mode: Option<AnalysisMode> = None;

    // Parse multipart form data
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());
                file_data = Some(field.bytes().await?.to_vec());
            }
            "mode" => {
                mode = Some(field.text().await?.parse()?);
            }
            _ => {}
        }
    }

    let file_data = file_data.ok_or(ApiError::MissingField("file"))?;
    let mode = mode.ok_or(ApiError::MissingField("mode"))?;
    let filename = filename.unwrap_or_else(|| "unknown".to_string());
    let content_type = content_type.unwrap_or_default();

    tracing::info!(
        "Analyzing file: {} ({} bytes, {}) as {}",
        filename,
        file_data.len(),
        content_type,
        mode
    );

    let upload = RawUpload::new(file_data, content_type.clone());
    let outcome = run_pipeline(
        &state.describer,
        &state.reports,
        upload,
        mode,
        state.render_remote_failures,
    )
    .await?;

    tracing::info!("Analysis completed for: {}", filename);

    Ok(Json(AnalysisResponse::from_outcome(
        filename,
        content_type,
        outcome,
    )))
}

/// Streams a report once; the file is deleted after it has been read.
pub async fn download_report<D>(
    State(state): State<Arc<AppState<D>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    D: Describer + Send + Sync + 'static,
{
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::ReportNotFound)?;
    let path = state.reports.report_path(&id);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::ReportNotFound),
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Could not remove delivered report {}: {}", path.display(), e);
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"analysis_report.pdf\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

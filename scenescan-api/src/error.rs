use analyzers::{AnalysisResult, ParseModeError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use parsers::image_parser::ImageLoadError;
use serde_json::json;
use thiserror::Error;

use crate::analysis::PipelineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing '{0}' field in request")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidMode(#[from] ParseModeError),

    #[error(transparent)]
    Load(#[from] ImageLoadError),

    #[error("{0}")]
    AnalysisFailed(String),

    #[error("Error analyzing image: {0}")]
    RemoteAnalysis(String),

    #[error("Analysis finished but the report could not be written: {message}")]
    ReportWrite {
        message: String,
        analysis: Box<AnalysisResult>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Report not found")]
    ReportNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Load(e) => ApiError::Load(e),
            PipelineError::Heuristic(e) => ApiError::AnalysisFailed(e.to_string()),
            PipelineError::Remote(e) => ApiError::RemoteAnalysis(e.to_string()),
            PipelineError::Report { source, result } => ApiError::ReportWrite {
                message: source.to_string(),
                analysis: result,
            },
            PipelineError::Worker(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingField(_) | ApiError::InvalidMode(_) => StatusCode::BAD_REQUEST,
            ApiError::Load(ImageLoadError::EmptyInput) => StatusCode::BAD_REQUEST,
            ApiError::Load(ImageLoadError::UnreadableImage(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Load(ImageLoadError::UnsupportedFormat(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::AnalysisFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RemoteAnalysis(_) => StatusCode::BAD_GATEWAY,
            ApiError::ReportWrite { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ReportNotFound => StatusCode::NOT_FOUND,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
        };

        let mut body = json!({
            "error": self.to_string(),
            "status": status.as_u16()
        });
        if let ApiError::ReportWrite { analysis, .. } = &self {
            body["analysis"] = json!(analysis);
        }

        (status, Json(body)).into_response()
    }
}

use analyzers::AnalysisResult;
use serde::{Deserialize, Serialize};

use crate::analysis::PipelineOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub file_info: FileInfo,
    pub analysis: AnalysisResult,
    pub report_id: String,
    pub report_pages: usize,
    /// True when the description service failed and the report body holds
    /// the error text.
    pub degraded: bool,
    pub remote_error: Option<String>,
    pub disclaimer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: usize,
    pub declared_type: String,
    pub detected_format: String,
    pub width: u32,
    pub height: u32,
}

impl AnalysisResponse {
    pub fn from_outcome(filename: String, declared_type: String, outcome: PipelineOutcome) -> Self {
        let disclaimer = outcome
            .result
            .findings()
            .map(|_| analyzers::brightness_analyzer::HEURISTIC_DISCLAIMER.to_string());

        Self {
            file_info: FileInfo {
                filename,
                size_bytes: outcome.image.source_bytes().len(),
                declared_type,
                detected_format: outcome.image.format().to_string(),
                width: outcome.image.width(),
                height: outcome.image.height(),
            },
            report_id: outcome.artifact.id.to_string(),
            report_pages: outcome.artifact.pages,
            degraded: outcome.remote_error.is_some(),
            remote_error: outcome.remote_error,
            disclaimer,
            analysis: outcome.result,
        }
    }
}

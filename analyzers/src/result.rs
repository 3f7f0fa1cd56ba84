use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::brightness_analyzer::{BrightnessStatus, TamperingReport, TamperingVerdict};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const GENERIC_INSTRUCTION: &str = "Describe this image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    EvidenceDetection,
    ObjectIdentification,
    SceneDescription,
    TamperingAnalysis,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 4] = [
        Self::EvidenceDetection,
        Self::ObjectIdentification,
        Self::SceneDescription,
        Self::TamperingAnalysis,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::EvidenceDetection => "Evidence Detection",
            Self::ObjectIdentification => "Object Identification",
            Self::SceneDescription => "Scene Description",
            Self::TamperingAnalysis => "Image Tampering Analysis",
        }
    }

    fn token(&self) -> &'static str {
        match self {
            Self::EvidenceDetection => "evidence-detection",
            Self::ObjectIdentification => "object-identification",
            Self::SceneDescription => "scene-description",
            Self::TamperingAnalysis => "tampering-analysis",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::TamperingAnalysis)
    }

    /// Prompt sent to the description service, `None` for locally handled modes.
    ///
    /// The remote modes all share one prompt for now.
    pub fn instruction(&self) -> Option<&'static str> {
        match self {
            Self::EvidenceDetection => Some(GENERIC_INSTRUCTION),
            Self::ObjectIdentification => Some(GENERIC_INSTRUCTION),
            Self::SceneDescription => Some(GENERIC_INSTRUCTION),
            Self::TamperingAnalysis => None,
        }
    }
}

impl Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error(
    "Unknown analysis mode '{0}'. Expected one of: evidence-detection, object-identification, scene-description, tampering-analysis"
)]
pub struct ParseModeError(pub String);

impl FromStr for AnalysisMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| {
                mode.token().eq_ignore_ascii_case(wanted) || mode.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TamperingFindings {
    pub brightness: f64,
    pub status: BrightnessStatus,
    pub verdict: TamperingVerdict,
}

impl From<TamperingReport> for TamperingFindings {
    fn from(report: TamperingReport) -> Self {
        Self {
            brightness: report.brightness,
            status: report.status,
            verdict: report.verdict,
        }
    }
}

/// Outcome of one analysis run. Built once, then read by the report builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    mode: AnalysisMode,
    timestamp: String,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tampering: Option<TamperingFindings>,
}

impl AnalysisResult {
    pub fn described(mode: AnalysisMode, description: String) -> Self {
        Self {
            mode,
            timestamp: now_timestamp(),
            body: description,
            tampering: None,
        }
    }

    pub fn tampering(report: TamperingReport) -> Self {
        Self {
            mode: AnalysisMode::TamperingAnalysis,
            timestamp: now_timestamp(),
            body: report.body(),
            tampering: Some(report.into()),
        }
    }

    /// A result whose body is the failure text of a remote analysis, for
    /// callers that still want to render a report after the remote call failed.
    pub fn remote_failure(mode: AnalysisMode, error: &dyn std::error::Error) -> Self {
        Self::described(mode, format!("Error: {}", error))
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn findings(&self) -> Option<&TamperingFindings> {
        self.tampering.as_ref()
    }
}

fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

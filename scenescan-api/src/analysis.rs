use analyzers::brightness_analyzer::{BrightnessAnalyzer, BrightnessError};
use analyzers::{AnalysisMode, AnalysisResult, Analyzer};
use parsers::Parser as _;
use parsers::image_parser::{DecodedImage, ImageLoadError, ImageParser, RawUpload};
use reports::{ReportArtifact, ReportBuilder, ReportWriteError};
use thiserror::Error;

use crate::describer::{Describer, RemoteAnalysisError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] ImageLoadError),

    #[error("Tampering analysis failed: {0}")]
    Heuristic(#[from] BrightnessError),

    #[error("Error analyzing image: {0}")]
    Remote(#[from] RemoteAnalysisError),

    /// The analysis itself succeeded and is carried along so it can still be
    /// shown to the caller.
    #[error("{source}")]
    Report {
        #[source]
        source: ReportWriteError,
        result: Box<AnalysisResult>,
    },

    #[error("Background task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Runs the analysis selected by `mode`. Remote failures are returned as
/// errors; rendering them is up to the caller.
pub async fn dispatch<D: Describer>(
    describer: &D,
    image: &DecodedImage,
    image_bytes: &[u8],
    mime_type: &str,
    mode: AnalysisMode,
) -> Result<AnalysisResult, PipelineError> {
    let Some(instruction) = mode.instruction() else {
        let report = BrightnessAnalyzer::analyze(image.image())?;
        return Ok(AnalysisResult::tampering(report));
    };

    let description = describer
        .describe(image_bytes, mime_type, instruction)
        .await?;
    Ok(AnalysisResult::described(mode, description))
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub image: DecodedImage,
    pub result: AnalysisResult,
    pub artifact: ReportArtifact,
    /// Set when the description service failed and the report carries the
    /// failure text instead of a description.
    pub remote_error: Option<String>,
}

/// Load, analyse, and write the report for a single upload. Decoding and
/// report writing run on the blocking pool.
pub async fn run_pipeline<D: Describer>(
    describer: &D,
    reports: &ReportBuilder,
    upload: RawUpload,
    mode: AnalysisMode,
    render_remote_failures: bool,
) -> Result<PipelineOutcome, PipelineError> {
    let declared = upload.media_type.clone();
    let image = tokio::task::spawn_blocking(move || ImageParser::parse(upload)).await??;
    let format = image.format();
    if !format.matches_media_type(&declared) {
        tracing::warn!(
            declared = %declared,
            detected = %format,
            "Declared media type does not match image contents, using detected format"
        );
    }

    tracing::info!(
        mode = %mode,
        format = %format,
        width = image.width(),
        height = image.height(),
        "Dispatching analysis"
    );

    let mut remote_error = None;
    let result = match dispatch(
        describer,
        &image,
        image.source_bytes(),
        format.mime_type(),
        mode,
    )
    .await
    {
        Ok(result) => result,
        Err(PipelineError::Remote(err)) if render_remote_failures => {
            tracing::warn!(error = %err, "Description failed, rendering degraded report");
            remote_error = Some(err.to_string());
            AnalysisResult::remote_failure(mode, &err)
        }
        Err(err) => return Err(err),
    };

    let builder = reports.clone();
    let (image, result, built) = tokio::task::spawn_blocking(move || {
        let built = builder.build(&image, &result);
        if let Err(e) = builder.sweep_expired() {
            tracing::warn!(error = %e, "Could not sweep expired reports");
        }
        (image, result, built)
    })
    .await?;

    let artifact = match built {
        Ok(artifact) => artifact,
        Err(source) => {
            tracing::error!(error = %source, "Report generation failed");
            return Err(PipelineError::Report {
                source,
                result: Box::new(result),
            });
        }
    };
    tracing::info!(report = %artifact.path.display(), pages = artifact.pages, "Report written");

    Ok(PipelineOutcome {
        image,
        result,
        artifact,
        remote_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyzers::brightness_analyzer::{BrightnessStatus, TamperingVerdict};
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        calls: AtomicUsize,
    }

    impl Describer for Canned {
        async fn describe(
            &self,
            _image_bytes: &[u8],
            _mime_type: &str,
            instruction: &str,
        ) -> Result<String, RemoteAnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("canned reply to '{}'", instruction))
        }
    }

    fn png(value: u8) -> DecodedImage {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(10, 10, Rgb([value; 3])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        ImageParser::parse(RawUpload::new(bytes, "image/png")).unwrap()
    }

    #[tokio::test]
    async fn test_tampering_stays_local() {
        let describer = Canned {
            calls: AtomicUsize::new(0),
        };
        let image = png(255);
        let result = dispatch(
            &describer,
            &image,
            image.source_bytes(),
            "image/png",
            AnalysisMode::TamperingAnalysis,
        )
        .await
        .unwrap();

        let findings = result.findings().unwrap();
        assert_eq!(findings.status, BrightnessStatus::HighBrightness);
        assert_eq!(findings.verdict, TamperingVerdict::PossiblyTampered);
        assert_eq!(describer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_modes_use_instruction() {
        let describer = Canned {
            calls: AtomicUsize::new(0),
        };
        let image = png(100);
        for mode in [
            AnalysisMode::EvidenceDetection,
            AnalysisMode::ObjectIdentification,
            AnalysisMode::SceneDescription,
        ] {
            let result = dispatch(&describer, &image, image.source_bytes(), "image/png", mode)
                .await
                .unwrap();
            assert_eq!(result.mode(), mode);
            assert_eq!(result.body(), "canned reply to 'Describe this image.'");
            assert!(result.findings().is_none());
        }
        assert_eq!(describer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispatch_is_idempotent() {
        let describer = Canned {
            calls: AtomicUsize::new(0),
        };
        let image = png(42);
        for mode in AnalysisMode::ALL {
            let first = dispatch(&describer, &image, image.source_bytes(), "image/png", mode)
                .await
                .unwrap();
            let second = dispatch(&describer, &image, image.source_bytes(), "image/png", mode)
                .await
                .unwrap();
            assert_eq!(first.body(), second.body());
            assert_eq!(first.findings(), second.findings());
        }
    }
}

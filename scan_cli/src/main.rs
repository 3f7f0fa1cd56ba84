mod json_report;

use std::path::{Path, PathBuf};

use analyzers::brightness_analyzer::HEURISTIC_DISCLAIMER;
use analyzers::{AnalysisMode, AnalysisResult};
use clap::Parser;
use infer::Infer;
use log::LevelFilter;
use parsers::image_parser::RawUpload;
use reports::ReportBuilder;
use scenescan_api::{AnalysisResponse, GeminiClient, PipelineError, ServiceConfig, run_pipeline};

#[derive(Parser)]
#[command(
    name = "scenescan",
    version = "0.1.0",
    about = "Analyze a crime scene image and write a PDF report"
)]
struct Args {
    /// Path to the image to analyze (JPEG, PNG or TIFF)
    #[arg(short, long, required = true)]
    file: PathBuf,

    /// Analysis mode: evidence-detection, object-identification,
    /// scene-description or tampering-analysis
    #[arg(short, long, default_value = "evidence-detection")]
    mode: AnalysisMode,

    /// Directory the report is written to
    #[arg(short, long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Media type to declare for the upload, sniffed from the file if omitted
    #[arg(long)]
    mime: Option<String>,

    /// Also write the analysis as JSON next to the PDF
    #[arg(long)]
    json: bool,

    /// Log pipeline progress at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn sniff_media_type(path: &Path, bytes: &[u8]) -> String {
    let infer = Infer::new();
    if let Some(kind) = infer.get(bytes) {
        return kind.mime_type().to_string();
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let by_extension = match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    };
    by_extension.to_string()
}

fn log_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(log_level(verbose));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

/// Timestamp, mode and body of a result, followed by the heuristic
/// disclaimer when tampering findings are present.
fn render_analysis(result: &AnalysisResult) -> String {
    let mut out = format!(
        "Timestamp: {}\nMode: {}\n\n{}\n",
        result.timestamp(),
        result.mode(),
        result.body()
    );
    if result.findings().is_some() {
        out.push('\n');
        out.push_str(HEURISTIC_DISCLAIMER);
        out.push('\n');
    }
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = ServiceConfig::from_env()?;
    if !args.mode.is_local() && config.gemini.api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set; the description request will fail");
    }

    let bytes = std::fs::read(&args.file)?;
    let media_type = args
        .mime
        .clone()
        .unwrap_or_else(|| sniff_media_type(&args.file, &bytes));

    log::debug!(
        "Analyzing {:?} ({} bytes, declared {}) as {}",
        args.file,
        bytes.len(),
        media_type,
        args.mode,
    );

    let describer = GeminiClient::new(config.gemini.clone())?;
    let reports = ReportBuilder::new(&args.output_dir);
    let outcome = match run_pipeline(
        &describer,
        &reports,
        RawUpload::new(bytes, media_type.clone()),
        args.mode,
        config.render_remote_failures,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(PipelineError::Report { source, result }) => {
            print!("{}", render_analysis(&result));
            log::error!("Analysis finished but the report could not be written");
            return Err(source.into());
        }
        Err(err) => return Err(err.into()),
    };
    let report_path = outcome.artifact.path.clone();

    let filename = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let response = AnalysisResponse::from_outcome(filename, media_type, outcome);

    print!("{}", render_analysis(&response.analysis));
    if let Some(error) = &response.remote_error {
        log::warn!("Description service failed: {}", error);
    }
    println!();
    println!("Report: {}", report_path.display());

    if args.json {
        let sidecar = json_report::sidecar_path(&report_path);
        json_report::save_to_file(&response, &sidecar)?;
        println!("JSON: {}", sidecar.display());
    }

    Ok(())
}

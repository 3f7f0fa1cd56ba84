use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use scenescan_api::AnalysisResponse;

pub fn to_json(response: &AnalysisResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}

/// Path of the JSON sidecar for a PDF report: same stem, `.json` extension.
pub fn sidecar_path(report_path: &Path) -> PathBuf {
    report_path.with_extension("json")
}

pub fn save_to_file(response: &AnalysisResponse, output_path: &Path) -> std::io::Result<()> {
    let json = to_json(response)?;
    let mut file = fs::File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

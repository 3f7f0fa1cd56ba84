pub mod layout;
pub mod pdf_report;

pub use pdf_report::{ReportArtifact, ReportBuilder, ReportWriteError};

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use analyzers::AnalysisResult;
use analyzers::brightness_analyzer::HEURISTIC_DISCLAIMER;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::Content;
use lopdf::{Document, Object, Stream, dictionary};
use parsers::image_parser::DecodedImage;
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::layout::{Align, CELL_HEIGHT, FONT_NAME, MM, PAGE_HEIGHT, PAGE_WIDTH, PageLayout};

pub const REPORT_TITLE: &str = "AI Forensic Dashboard Analysis Report";
pub const IMAGE_WIDTH: f32 = 100.0 * MM;

const REPORT_PREFIX: &str = "analysis_report_";
const REPORT_EXTENSION: &str = ".pdf";
const IMAGE_XOBJECT: &str = "Im1";
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum ReportWriteError {
    #[error("Failed to encode the image for the report: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to assemble the PDF document: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Failed to write the report file: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished report on disk. The builder keeps no handle to it.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub id: Uuid,
    pub path: PathBuf,
    pub pages: usize,
}

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    output_dir: PathBuf,
    retention: Option<Duration>,
}

impl ReportBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            retention: None,
        }
    }

    /// Reports older than `retention` are removed by [`Self::sweep_expired`].
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Location a report with the given id is (or would be) written to.
    pub fn report_path(&self, id: &Uuid) -> PathBuf {
        self.output_dir
            .join(format!("{}{}{}", REPORT_PREFIX, id, REPORT_EXTENSION))
    }

    /// Deletes reports whose modification time is past the retention window
    /// and returns how many were removed. Other files are left alone, and a
    /// missing output directory counts as empty.
    pub fn sweep_expired(&self) -> std::io::Result<usize> {
        let Some(retention) = self.retention else {
            return Ok(0);
        };
        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(REPORT_PREFIX) || !name.ends_with(REPORT_EXTENSION) {
                continue;
            }

            let modified = entry.metadata()?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age > retention {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    // Already fetched and deleted by a concurrent download.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(removed)
    }

    pub fn build(
        &self,
        image: &DecodedImage,
        result: &AnalysisResult,
    ) -> Result<ReportArtifact, ReportWriteError> {
        let jpeg = encode_jpeg(image.image())?;

        let mut layout = PageLayout::new();
        layout.line(REPORT_TITLE, Align::Center);
        layout.gap(CELL_HEIGHT);
        layout.line(&format!("Timestamp: {}", result.timestamp()), Align::Left);
        layout.line(&format!("Mode: {}", result.mode()), Align::Left);
        layout.gap(CELL_HEIGHT);
        layout.line("Analysis Results:", Align::Left);
        layout.paragraph(result.body());
        if result.findings().is_some() {
            layout.gap(CELL_HEIGHT / 2.0);
            layout.paragraph(HEURISTIC_DISCLAIMER);
        }
        layout.gap(CELL_HEIGHT);
        layout.line("Uploaded Image:", Align::Left);
        layout.image(IMAGE_XOBJECT, IMAGE_WIDTH, image.width(), image.height());

        let pages = layout.finish();
        let page_count = pages.len();
        let mut doc = assemble(pages, jpeg, image.width(), image.height())?;

        let id = Uuid::new_v4();
        let path = self.report_path(&id);
        self.persist(&mut doc, &path)?;

        Ok(ReportArtifact {
            id,
            path,
            pages: page_count,
        })
    }

    /// Writes into a temp file next to the destination and renames it into
    /// place. The temp file is unlinked on drop if anything fails.
    fn persist(&self, doc: &mut Document, path: &Path) -> Result<(), ReportWriteError> {
        fs::create_dir_all(&self.output_dir)?;
        let mut staging = NamedTempFile::new_in(&self.output_dir)?;
        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            doc.save_to(&mut writer)?;
            writer.flush()?;
        }
        staging.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;
    Ok(bytes)
}

fn assemble(
    pages: Vec<Vec<lopdf::content::Operation>>,
    jpeg: Vec<u8>,
    pixel_width: u32,
    pixel_height: u32,
) -> Result<Document, ReportWriteError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(pixel_width),
            "Height" => i64::from(pixel_height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_NAME => font_id },
        "XObject" => dictionary! { IMAGE_XOBJECT => image_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let media_box: Vec<Object> = vec![
        0i64.into(),
        0i64.into(),
        PAGE_WIDTH.into(),
        PAGE_HEIGHT.into(),
    ];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyzers::AnalysisMode;
    use analyzers::brightness_analyzer::TamperingReport;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use parsers::Parser;
    use parsers::image_parser::{ImageParser, RawUpload};
    use std::io::Cursor;

    fn fixture(width: u32, height: u32) -> DecodedImage {
        let img =
            DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([90, 60, 30])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        ImageParser::parse(RawUpload::new(bytes, "image/png")).unwrap()
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn test_report_fields_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            AnalysisResult::described(AnalysisMode::SceneDescription, "A kitchen counter.".into());
        let artifact = ReportBuilder::new(dir.path())
            .build(&fixture(10, 10), &result)
            .unwrap();

        let bytes = fs::read(&artifact.path).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let position = |needle: &str| {
            bytes
                .windows(needle.len())
                .position(|w| w == needle.as_bytes())
                .unwrap_or_else(|| panic!("missing {needle}"))
        };
        let title = position(REPORT_TITLE);
        let mode = position("Mode: Scene Description");
        let body = position("A kitchen counter.");
        let image_label = position("Uploaded Image:");
        assert!(title < mode && mode < body && body < image_label);
        assert!(contains(&bytes, "/DCTDecode"));
        assert_eq!(artifact.pages, 1);
    }

    #[test]
    fn test_report_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let result = AnalysisResult::tampering(TamperingReport::from_brightness(0.0));
        let artifact = ReportBuilder::new(dir.path())
            .build(&fixture(40, 20), &result)
            .unwrap();

        let doc = Document::load(&artifact.path).unwrap();
        assert_eq!(doc.get_pages().len(), artifact.pages);

        let bytes = fs::read(&artifact.path).unwrap();
        assert!(contains(&bytes, "Brightness: 0.00 (Low brightness detected)"));
        assert!(contains(&bytes, "forensic proof of manipulation."));
    }

    #[test]
    fn test_long_body_paginates() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Evidence marker near the doorway.\n".repeat(120);
        let result = AnalysisResult::described(AnalysisMode::EvidenceDetection, body);
        let artifact = ReportBuilder::new(dir.path())
            .build(&fixture(10, 10), &result)
            .unwrap();

        assert!(artifact.pages > 1);
        let doc = Document::load(&artifact.path).unwrap();
        assert_eq!(doc.get_pages().len(), artifact.pages);
    }

    #[test]
    fn test_names_are_unique_and_no_staging_left() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ReportBuilder::new(dir.path());
        let result = AnalysisResult::described(AnalysisMode::SceneDescription, "x".into());
        let image = fixture(10, 10);

        let first = builder.build(&image, &result).unwrap();
        let second = builder.build(&image, &result).unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(first.path, builder.report_path(&first.id));
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_sweep_removes_only_expired_reports() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ReportBuilder::new(dir.path()).with_retention(Duration::from_secs(3600));
        let result = AnalysisResult::described(AnalysisMode::SceneDescription, "x".into());

        let stale = builder.build(&fixture(10, 10), &result).unwrap();
        let fresh = builder.build(&fixture(10, 10), &result).unwrap();
        let unrelated = dir.path().join("notes.pdf");
        fs::write(&unrelated, b"keep").unwrap();

        let two_hours_ago = SystemTime::now() - Duration::from_secs(7200);
        for path in [&stale.path, &unrelated] {
            fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(two_hours_ago)
                .unwrap();
        }

        assert_eq!(builder.sweep_expired().unwrap(), 1);
        assert!(!stale.path.exists());
        assert!(fresh.path.exists());
        assert!(unrelated.exists());
    }

    #[test]
    fn test_sweep_without_retention_or_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-created");

        assert_eq!(ReportBuilder::new(dir.path()).sweep_expired().unwrap(), 0);
        let builder = ReportBuilder::new(&missing).with_retention(Duration::from_secs(1));
        assert_eq!(builder.sweep_expired().unwrap(), 0);
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let result = AnalysisResult::described(AnalysisMode::SceneDescription, "x".into());
        let err = ReportBuilder::new(&blocker)
            .build(&fixture(10, 10), &result)
            .unwrap_err();
        assert!(matches!(err, ReportWriteError::Io(_)));
    }
}

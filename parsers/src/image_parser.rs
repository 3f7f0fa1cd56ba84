use std::fmt::Display;

use image::{ColorType, DynamicImage, ImageFormat};
use thiserror::Error;

use crate::Parser;

pub struct ImageParser;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("No image data was uploaded")]
    EmptyInput,

    #[error("Unable to read the uploaded file as an image: {0}")]
    UnreadableImage(#[source] image::ImageError),

    #[error("Unsupported file format {0}. Please upload a .jpg, .jpeg, .png, or .tif file")]
    UnsupportedFormat(String),
}

/// Bytes as received from the client, plus the media type it claimed.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl RawUpload {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    Jpeg,
    Png,
    Tiff,
}

impl SupportedFormat {
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
        }
    }

    /// Whether a client-declared media type names this format.
    pub fn matches_media_type(&self, declared: &str) -> bool {
        let declared = declared.trim().to_ascii_lowercase();
        match self {
            Self::Jpeg => declared == "image/jpeg" || declared == "image/jpg",
            Self::Png => declared == "image/png",
            Self::Tiff => declared == "image/tiff" || declared == "image/tif",
        }
    }
}

impl Display for SupportedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Tiff => "TIFF",
        };
        f.write_str(name)
    }
}

/// A validated image. The encoded source bytes are kept alongside the pixels
/// so they can be forwarded without re-encoding.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
    format: SupportedFormat,
    source: Vec<u8>,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn color(&self) -> ColorType {
        self.image.color()
    }

    pub fn format(&self) -> SupportedFormat {
        self.format
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }
}

impl Parser for ImageParser {
    type Input = RawUpload;
    type Output = DecodedImage;
    type Error = ImageLoadError;

    fn parse(input: Self::Input) -> Result<Self::Output, Self::Error> {
        if input.bytes.is_empty() {
            return Err(ImageLoadError::EmptyInput);
        }

        let detected =
            image::guess_format(&input.bytes).map_err(ImageLoadError::UnreadableImage)?;
        let format = SupportedFormat::from_image_format(detected)
            .ok_or_else(|| ImageLoadError::UnsupportedFormat(format!("{:?}", detected)))?;

        let image = image::load_from_memory_with_format(&input.bytes, detected)
            .map_err(ImageLoadError::UnreadableImage)?;

        // TIFFs come in many color layouts; normalise to 8-bit RGB for display.
        let image =
            if format == SupportedFormat::Tiff && !matches!(image, DynamicImage::ImageRgb8(_)) {
                DynamicImage::ImageRgb8(image.to_rgb8())
            } else {
                image
            };

        Ok(DecodedImage {
            image,
            format,
            source: input.bytes,
        })
    }
}

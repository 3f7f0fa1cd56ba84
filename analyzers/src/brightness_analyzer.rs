//! Brightness-based tampering signal.
//!
//! This is a single weak heuristic: an image that is unusually dark or bright
//! is flagged. It is not forensic proof of manipulation, and every surface
//! showing its verdict must say so (see [`HEURISTIC_DISCLAIMER`]).

use std::fmt::Display;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Analyzer;

pub const LOW_BRIGHTNESS_THRESHOLD: f64 = 50.0;
pub const HIGH_BRIGHTNESS_THRESHOLD: f64 = 200.0;

pub const HEURISTIC_DISCLAIMER: &str = "Note: the tampering verdict is based solely on mean \
brightness. It is a single weak signal, not forensic proof of manipulation.";

pub struct BrightnessAnalyzer;

#[derive(Debug, Error)]
pub enum BrightnessError {
    #[error("Image has no pixels to measure")]
    NoPixels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrightnessStatus {
    Normal,
    LowBrightness,
    HighBrightness,
}

impl BrightnessStatus {
    pub fn classify(brightness: f64) -> Self {
        if brightness < LOW_BRIGHTNESS_THRESHOLD {
            Self::LowBrightness
        } else if brightness > HIGH_BRIGHTNESS_THRESHOLD {
            Self::HighBrightness
        } else {
            Self::Normal
        }
    }
}

impl Display for BrightnessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Normal => "Normal",
            Self::LowBrightness => "Low brightness detected",
            Self::HighBrightness => "High brightness detected",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperingVerdict {
    Untampered,
    PossiblyTampered,
}

impl From<BrightnessStatus> for TamperingVerdict {
    fn from(status: BrightnessStatus) -> Self {
        match status {
            BrightnessStatus::Normal => Self::Untampered,
            _ => Self::PossiblyTampered,
        }
    }
}

impl Display for TamperingVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Untampered => "Image appears untampered",
            Self::PossiblyTampered => "Possible image tampering detected due to brightness issues",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TamperingReport {
    pub brightness: f64,
    pub status: BrightnessStatus,
    pub verdict: TamperingVerdict,
}

impl TamperingReport {
    pub fn from_brightness(brightness: f64) -> Self {
        let status = BrightnessStatus::classify(brightness);
        Self {
            brightness,
            status,
            verdict: status.into(),
        }
    }

    /// `Brightness: 12.34 (Low brightness detected)`
    pub fn summary(&self) -> String {
        format!("Brightness: {:.2} ({})", self.brightness, self.status)
    }

    pub fn body(&self) -> String {
        format!("{}\n\nStatus: {}", self.summary(), self.verdict)
    }
}

impl Analyzer for BrightnessAnalyzer {
    type Input = DynamicImage;
    type Output = TamperingReport;
    type Error = BrightnessError;

    fn analyze(input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let (width, height) = input.dimensions();
        let pixel_count = u64::from(width) * u64::from(height);
        if pixel_count == 0 {
            return Err(BrightnessError::NoPixels);
        }

        let total: u64 = match input {
            DynamicImage::ImageLuma8(gray) => gray.pixels().map(|p| u64::from(p[0])).sum(),
            _ => input
                .to_rgb8()
                .pixels()
                .map(|p| u64::from(luma(p[0], p[1], p[2])))
                .sum(),
        };

        Ok(TamperingReport::from_brightness(
            total as f64 / pixel_count as f64,
        ))
    }
}

/// ITU-R 601-2 luma in 16.16 fixed point, rounded.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000;
    (weighted >> 16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, RgbImage};

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(128, 128, 128), 128);
        // pure red weighs in at roughly 0.299
        assert_eq!(luma(255, 0, 0), 76);
    }

    #[test]
    fn test_solid_black_is_low() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(10, 10, Rgb([0, 0, 0])));
        let report = BrightnessAnalyzer::analyze(&img).unwrap();

        assert_eq!(report.brightness, 0.0);
        assert_eq!(report.status, BrightnessStatus::LowBrightness);
        assert_eq!(report.verdict, TamperingVerdict::PossiblyTampered);
        assert_eq!(report.summary(), "Brightness: 0.00 (Low brightness detected)");
    }

    #[test]
    fn test_solid_white_is_high() {
        let img = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(3, 3, Luma([255u8])));
        let report = BrightnessAnalyzer::analyze(&img).unwrap();

        assert_eq!(report.brightness, 255.0);
        assert_eq!(report.status, BrightnessStatus::HighBrightness);
    }

    #[test]
    fn test_mid_gray_is_normal() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(10, 10, Rgb([128, 128, 128])));
        let report = BrightnessAnalyzer::analyze(&img).unwrap();

        assert_eq!(report.brightness, 128.0);
        assert_eq!(report.status, BrightnessStatus::Normal);
        assert_eq!(
            report.body(),
            "Brightness: 128.00 (Normal)\n\nStatus: Image appears untampered"
        );
    }

    #[test]
    fn test_mean_over_mixed_pixels() {
        let img: RgbImage = ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 { Rgb([0, 0, 0]) } else { Rgb([101, 101, 101]) }
        });
        let report = BrightnessAnalyzer::analyze(&DynamicImage::ImageRgb8(img)).unwrap();

        assert_eq!(report.brightness, 50.5);
        assert_eq!(report.summary(), "Brightness: 50.50 (Normal)");
    }

    #[test]
    fn test_alpha_is_ignored() {
        let img = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            4,
            4,
            image::Rgba([220, 220, 220, 0]),
        ));
        let report = BrightnessAnalyzer::analyze(&img).unwrap();
        assert_eq!(report.status, BrightnessStatus::HighBrightness);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(BrightnessStatus::classify(50.0), BrightnessStatus::Normal);
        assert_eq!(BrightnessStatus::classify(200.0), BrightnessStatus::Normal);
        assert_eq!(BrightnessStatus::classify(49.99), BrightnessStatus::LowBrightness);
        assert_eq!(BrightnessStatus::classify(200.01), BrightnessStatus::HighBrightness);
    }

    #[test]
    fn test_deterministic() {
        let img: RgbImage = ImageBuffer::from_fn(37, 23, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8])
        });
        let img = DynamicImage::ImageRgb8(img);
        let first = BrightnessAnalyzer::analyze(&img).unwrap();
        let second = BrightnessAnalyzer::analyze(&img.clone()).unwrap();

        assert_eq!(first.brightness.to_bits(), second.brightness.to_bits());
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            BrightnessAnalyzer::analyze(&img),
            Err(BrightnessError::NoPixels)
        ));
    }
}

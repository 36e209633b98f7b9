//! Image preprocessing for mark detection
//!
//! Turns a raw sheet image into a [`BinaryMask`] where ink is foreground.

pub mod mask;
pub mod pipeline;
pub mod steps;

pub use mask::BinaryMask;
pub use pipeline::{Pipeline, PreprocessingResult, StepTiming};

use crate::error::ImageError;
use image::DynamicImage;

/// Sheet image as handed over by the caller.
#[derive(Debug, Clone)]
pub enum RasterImage {
    /// Encoded file content (PNG, JPEG, BMP, TIFF, ...)
    Encoded(Vec<u8>),
    /// Already decoded pixels
    Decoded(DynamicImage),
}

impl From<Vec<u8>> for RasterImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Encoded(bytes)
    }
}

impl From<DynamicImage> for RasterImage {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

/// Run the standard preprocessing pipeline and keep only the mask.
pub fn preprocess(image: &RasterImage) -> Result<BinaryMask, ImageError> {
    Pipeline::new().process(image).map(|result| result.mask)
}

use crate::error::ImageError;
use image::{DynamicImage, GrayImage};

/// Collapse the sheet to a single intensity channel
pub fn apply(image: DynamicImage) -> Result<GrayImage, ImageError> {
    Ok(image.into_luma8())
}

use crate::error::ImageError;
use crate::preprocessing::RasterImage;
use image::{DynamicImage, GenericImageView};

/// Decode the raw sheet and reject images without any pixels
pub fn apply(image: &RasterImage) -> Result<DynamicImage, ImageError> {
    let decoded = match image {
        RasterImage::Encoded(bytes) => image::load_from_memory(bytes)
            .map_err(|e| ImageError::Decode(e.to_string()))?,
        RasterImage::Decoded(img) => img.clone(),
    };

    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(ImageError::EmptyImage { width, height });
    }

    Ok(decoded)
}

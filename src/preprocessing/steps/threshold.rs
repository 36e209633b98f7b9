use crate::error::ImageError;
use crate::preprocessing::BinaryMask;
use image::GrayImage;
use imageproc::contrast::otsu_level;

/// Apply inverse Otsu binarisation.
///
/// The level adapts to each scan's own histogram, so lighting differences
/// between sheets don't need a hand-tuned cutoff. Pixels at or below the
/// level become ink (1), everything brighter is paper (0).
pub fn apply(image: GrayImage) -> Result<(BinaryMask, u8), ImageError> {
    let level = otsu_level(&image);
    Ok((binarize_inverted(&image, level), level))
}

/// Mark every pixel `<= level` as foreground.
pub fn binarize_inverted(image: &GrayImage, level: u8) -> BinaryMask {
    BinaryMask::from_fn(image.width(), image.height(), |x, y| {
        image.get_pixel(x, y).0[0] <= level
    })
}

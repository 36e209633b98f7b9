use crate::error::ImageError;
use image::GrayImage;
use imageproc::filter::separable_filter_equal;

/// Kernel width of the smoothing filter
const KERNEL_SIZE: usize = 5;

/// Apply a 5x5 Gaussian blur to suppress scan noise before thresholding
pub fn apply(image: GrayImage) -> Result<GrayImage, ImageError> {
    let kernel = gaussian_kernel(KERNEL_SIZE);
    Ok(separable_filter_equal(&image, &kernel))
}

/// Normalised 1-D Gaussian taps for an odd `size`.
///
/// Sigma follows the usual derivation from kernel size:
/// `0.3 * ((size - 1) / 2 - 1) + 0.8`, i.e. 1.1 for five taps.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let taps: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_kernel_is_normalised_and_symmetric() {
        let kernel = gaussian_kernel(5);
        assert_eq!(kernel.len(), 5);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[4]).abs() < 1e-6);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_blur_smooths_isolated_speck() {
        let mut img = GrayImage::from_pixel(11, 11, Luma([240]));
        img.put_pixel(5, 5, Luma([0]));

        let blurred = apply(img).unwrap();

        assert!(blurred.get_pixel(5, 5).0[0] > 100);
        assert!(blurred.get_pixel(4, 5).0[0] < 240);
    }

    #[test]
    fn test_blur_keeps_uniform_image() {
        let img = GrayImage::from_pixel(9, 9, Luma([128]));
        let blurred = apply(img).unwrap();

        for pixel in blurred.pixels() {
            assert!((pixel.0[0] as i32 - 128).abs() <= 1);
        }
    }
}

use crate::error::ImageError;
use serde::Serialize;
use std::time::Instant;

use super::steps;
use super::{BinaryMask, RasterImage};

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Ink mask (not serialized)
    #[serde(skip)]
    pub mask: BinaryMask,
    /// Otsu level picked for this sheet; pixels at or below it are ink
    pub otsu_level: u8,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Decode → grayscale → 5x5 Gaussian → inverse Otsu binarisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline;

impl Pipeline {
    pub fn new() -> Self {
        Self
    }

    /// Process a raw sheet image into an ink mask
    pub fn process(&self, image: &RasterImage) -> Result<PreprocessingResult, ImageError> {
        let start = Instant::now();
        let mut steps_timing = Vec::new();

        let decoded = self.run_step("decode", image, &mut steps_timing, steps::decode::apply)?;
        let gray = self.run_step("grayscale", decoded, &mut steps_timing, steps::grayscale::apply)?;
        let blurred = self.run_step("blur", gray, &mut steps_timing, steps::blur::apply)?;
        let (mask, otsu_level) =
            self.run_step("threshold", blurred, &mut steps_timing, steps::threshold::apply)?;

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            "Preprocessed {}x{} sheet in {}ms (otsu level {}, {} ink pixels)",
            mask.width(),
            mask.height(),
            total_time_ms,
            otsu_level,
            mask.foreground_count()
        );

        Ok(PreprocessingResult {
            mask,
            otsu_level,
            total_time_ms,
            steps: steps_timing,
        })
    }

    fn run_step<I, O, F>(
        &self,
        name: &str,
        input: I,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<O, ImageError>
    where
        F: FnOnce(I) -> Result<O, ImageError>,
    {
        let step_start = Instant::now();
        let result = step_fn(input)?;
        let time_ms = step_start.elapsed().as_millis() as u64;
        tracing::trace!("Preprocessing step {} took {}ms", name, time_ms);
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms,
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;
    use std::io::Cursor;

    fn sheet_with_mark() -> RgbImage {
        let mut img = RgbImage::from_pixel(120, 80, Rgb([235, 235, 230]));
        draw_filled_circle_mut(&mut img, (40, 40), 10, Rgb([30, 30, 40]));
        img
    }

    #[test]
    fn test_pipeline_marks_ink_as_foreground() {
        let image = RasterImage::Decoded(DynamicImage::ImageRgb8(sheet_with_mark()));

        let result = Pipeline::new().process(&image).unwrap();

        assert_eq!(result.mask.dimensions(), (120, 80));
        assert_eq!(result.mask.get(40, 40), 1);
        assert_eq!(result.mask.get(100, 10), 0);
    }

    #[test]
    fn test_pipeline_records_each_step() {
        let image = RasterImage::Decoded(DynamicImage::ImageRgb8(sheet_with_mark()));

        let result = Pipeline::new().process(&image).unwrap();
        let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["decode", "grayscale", "blur", "threshold"]);
    }

    #[test]
    fn test_pipeline_decodes_png_bytes() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(sheet_with_mark())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let mask = crate::preprocessing::preprocess(&RasterImage::Encoded(bytes)).unwrap();

        assert_eq!(mask.get(40, 40), 1);
    }

    #[test]
    fn test_pipeline_rejects_garbage() {
        let err = Pipeline::new()
            .process(&RasterImage::Encoded(b"not an image".to_vec()))
            .unwrap_err();

        assert!(matches!(err, ImageError::Decode(_)));
    }
}

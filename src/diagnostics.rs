//! Diagnostic artifacts for sampled bubble regions
//!
//! Grading never writes anything itself. When diagnostics are enabled the
//! batch pipeline hands every sampled region to a caller supplied
//! [`DiagnosticSink`]; whatever the sink does with it cannot change a result.

use crate::classifier::BubbleRegion;
use crate::error::SinkError;
use image::{GrayImage, Luma};
use std::path::PathBuf;

/// Receiver of per-bubble artifacts, shared by all sheet workers.
pub trait DiagnosticSink: Send + Sync {
    /// Returns the sink identifier (e.g., "directory")
    fn name(&self) -> &'static str;

    /// Store one sampled region of sheet `sheet_id`
    fn emit(&self, sheet_id: &str, region: &BubbleRegion<'_>) -> Result<(), SinkError>;
}

/// Writes each region as `<sheet>_q<NN>_<option>.png` (ink white) into a directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Create the sink, making sure the target directory exists.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        tracing::info!("Writing bubble diagnostics to {}", root.display());
        Ok(Self { root })
    }

    pub fn artifact_path(&self, sheet_id: &str, question: u32, option: &str) -> PathBuf {
        self.root.join(format!(
            "{}_q{:02}_{}.png",
            sanitize(sheet_id),
            question,
            sanitize(option)
        ))
    }
}

impl DiagnosticSink for DirectorySink {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn emit(&self, sheet_id: &str, region: &BubbleRegion<'_>) -> Result<(), SinkError> {
        // Nothing to draw for a bubble outside the image
        if region.width == 0 || region.height == 0 {
            return Ok(());
        }

        let width = region.width;
        let image = GrayImage::from_fn(width, region.height, |x, y| {
            Luma([region.pixels[(y * width + x) as usize] * 255])
        });

        let path = self.artifact_path(sheet_id, region.question, region.option);
        image
            .save(&path)
            .map_err(|e| SinkError::Encode(format!("{}: {}", path.display(), e)))
    }
}

/// Keep file names portable.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Point;

    fn region<'a>(pixels: &'a [u8], width: u32, height: u32) -> BubbleRegion<'a> {
        BubbleRegion {
            question: 3,
            option: "b",
            center: Point { x: 10, y: 10 },
            width,
            height,
            pixels,
            ratio: 0.5,
        }
    }

    #[test]
    fn test_directory_sink_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("debug")).unwrap();
        let pixels = [1, 0, 0, 1];

        sink.emit("4821", &region(&pixels, 2, 2)).unwrap();

        let written = image::open(sink.artifact_path("4821", 3, "b")).unwrap().to_luma8();
        assert_eq!(written.get_pixel(0, 0).0[0], 255);
        assert_eq!(written.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn test_directory_sink_skips_empty_region() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path()).unwrap();

        sink.emit("x", &region(&[], 0, 0)).unwrap();

        assert!(!sink.artifact_path("x", 3, "b").exists());
    }

    #[test]
    fn test_artifact_path_is_sanitized() {
        let sink = DirectorySink {
            root: PathBuf::from("/tmp/omr"),
        };
        assert_eq!(
            sink.artifact_path("../etc/pass wd", 7, "a"),
            PathBuf::from("/tmp/omr/___etc_pass_wd_q07_a.png")
        );
    }
}

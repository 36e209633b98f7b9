use crate::classifier::Thresholds;
use crate::error::ConfigError;
use crate::layout::FormLayout;
use std::path::{Path, PathBuf};

/// Everything that decides how sheets are graded
#[derive(Debug, Clone)]
pub struct GradingConfig {
    pub layout: FormLayout,
    pub thresholds: Thresholds,
    /// Emit per-bubble artifacts to the diagnostic sink
    pub diagnostics: bool,
    /// Sheets graded concurrently
    pub workers: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            layout: FormLayout::default(),
            thresholds: Thresholds::default(),
            diagnostics: false,
            workers: default_workers(),
        }
    }
}

impl GradingConfig {
    /// Validate once before any sheet is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Largest accepted single sheet image, in bytes
    pub max_file_size: usize,
    /// Largest accepted request body, in bytes
    pub max_request_size: usize,
    /// Where the directory sink writes when diagnostics are on
    pub diagnostics_dir: PathBuf,
    pub grading: GradingConfig,
}

/// Number of sheet workers when none is configured
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Read a JSON [`FormLayout`] from disk and validate it.
pub fn load_layout(path: &Path) -> Result<FormLayout, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::LayoutFile(format!("{}: {}", path.display(), e)))?;
    let layout: FormLayout = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::LayoutFile(format!("{}: {}", path.display(), e)))?;
    layout.validate()?;
    Ok(layout)
}

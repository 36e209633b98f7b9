//! Optical mark recognition for bubble answer sheets
//!
//! Scanned sheets go through [`preprocessing`] (ink mask), [`classifier`]
//! (fill ratios and per-question outcomes) and [`statistics`], driven over
//! many sheets by [`batch::BatchPipeline`]. [`server`] exposes the batch
//! as an HTTP service.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod layout;
pub mod preprocessing;
pub mod server;
pub mod sheet;
pub mod statistics;

pub use batch::{BatchPipeline, BatchResult};
pub use classifier::{classify, FillSample, QuestionAnswer, QuestionOutcome, Thresholds};
pub use config::{Config, GradingConfig};
pub use diagnostics::{DiagnosticSink, DirectorySink};
pub use error::{ClassificationError, ConfigError, ImageError, SheetError};
pub use layout::{ColumnGeometry, CoordinateMap, FormLayout};
pub use preprocessing::{preprocess, BinaryMask, RasterImage};
pub use sheet::{ProcessingStatus, SheetIdentity, SheetInput, SheetResult};
pub use statistics::{summarize, SheetStatistics};

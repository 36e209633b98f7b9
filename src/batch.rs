//! Batch grading
//!
//! Each sheet runs `Pending → Decoding → Classifying → Done`, or drops to
//! `Failed(reason)` at whichever stage broke. A failed sheet never stops the
//! batch. Sheets run on a bounded set of blocking workers and the results
//! come back in input order regardless of completion order.

use crate::classifier::{classify, classify_with, Classification, Thresholds};
use crate::config::GradingConfig;
use crate::diagnostics::DiagnosticSink;
use crate::error::{ConfigError, SheetError};
use crate::layout::CoordinateMap;
use crate::preprocessing::{preprocess, RasterImage};
use crate::sheet::{SheetInput, SheetResult, SheetStage};
use crate::statistics::{self, BatchSummary};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Ordered per-sheet results of one run with success/failure counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub sheets: Vec<SheetResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BatchResult {
    pub fn from_results(sheets: Vec<SheetResult>) -> Self {
        let success_count = sheets.iter().filter(|s| s.is_success()).count();
        let failure_count = sheets.len() - success_count;
        Self {
            sheets,
            success_count,
            failure_count,
        }
    }

    pub fn total(&self) -> usize {
        self.sheets.len()
    }

    /// `(sheet_id, reason)` of every failed sheet, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sheets
            .iter()
            .filter_map(|s| s.failure_reason().map(|reason| (s.sheet_id(), reason)))
    }

    pub fn summary(&self) -> BatchSummary {
        statistics::summarize_batch(self)
    }
}

/// Grades sheets against one fixed layout and threshold pair.
pub struct BatchPipeline {
    coords: Arc<CoordinateMap>,
    thresholds: Thresholds,
    workers: usize,
    diagnostics: bool,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl BatchPipeline {
    /// Validate the configuration and derive the coordinate map.
    ///
    /// Any error here is a deployment problem and no sheet gets processed.
    pub fn new(config: &GradingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let coords = CoordinateMap::build(&config.layout)?;

        info!(
            "Grading {} questions x {} options, thresholds empty={} fill={}, {} workers",
            coords.question_count(),
            coords.options().len(),
            config.thresholds.empty(),
            config.thresholds.fill(),
            config.workers.max(1)
        );

        Ok(Self {
            coords: Arc::new(coords),
            thresholds: config.thresholds,
            workers: config.workers.max(1),
            diagnostics: config.diagnostics,
            sink: None,
        })
    }

    /// Attach a diagnostic sink. Ignored unless the config enabled diagnostics.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        if !self.diagnostics {
            debug!("Diagnostics disabled, not attaching {} sink", sink.name());
            return self;
        }
        info!("Diagnostics enabled ({} sink)", sink.name());
        self.sink = Some(sink);
        self
    }

    /// Whether sampled regions reach a sink.
    pub fn emits_diagnostics(&self) -> bool {
        self.sink.is_some()
    }

    pub fn coordinates(&self) -> &CoordinateMap {
        &self.coords
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Grade all sheets on the worker pool, preserving input order.
    pub async fn run(&self, sheets: Vec<SheetInput>) -> BatchResult {
        let total = sheets.len();
        info!("Starting batch of {} sheets", total);
        if self.diagnostics && self.sink.is_none() {
            warn!("Diagnostics enabled but no sink attached; no artifacts will be written");
        }

        let results: Vec<SheetResult> = stream::iter(sheets.into_iter().enumerate().map(
            |(index, input)| {
                let coords = Arc::clone(&self.coords);
                let thresholds = self.thresholds;
                let sink = self.sink.clone();
                let meta = input.meta.clone();

                async move {
                    debug!("[{}/{}] Queued sheet {}", index + 1, total, meta.sheet_id);
                    let worker = tokio::task::spawn_blocking(move || {
                        process_sheet(input, &coords, &thresholds, sink.as_deref())
                    });
                    match worker.await {
                        Ok(result) => result,
                        Err(e) => {
                            error!(
                                "[{}/{}] Sheet worker for {} died: {}",
                                index + 1,
                                total,
                                meta.sheet_id,
                                e
                            );
                            let reason = SheetError::Worker(e.to_string()).to_string();
                            SheetResult::failed(meta, thresholds, reason)
                        }
                    }
                }
            },
        ))
        .buffered(self.workers)
        .collect()
        .await;

        let batch = BatchResult::from_results(results);
        log_batch_complete(&batch);
        batch
    }

    /// Grade all sheets one after another on the calling thread.
    pub fn run_sequential(&self, sheets: Vec<SheetInput>) -> BatchResult {
        let results = sheets
            .into_iter()
            .map(|input| process_sheet(input, &self.coords, &self.thresholds, self.sink.as_deref()))
            .collect();
        let batch = BatchResult::from_results(results);
        log_batch_complete(&batch);
        batch
    }
}

/// Run one sheet through preprocessing, classification and statistics.
///
/// Never fails: any stage error becomes a `Failed` result with its reason.
pub fn process_sheet(
    input: SheetInput,
    coords: &CoordinateMap,
    thresholds: &Thresholds,
    sink: Option<&dyn DiagnosticSink>,
) -> SheetResult {
    let SheetInput { meta, image } = input;
    let mut tracker = StageTracker::new(&meta.sheet_id);

    match grade(&mut tracker, &image, coords, thresholds, sink) {
        Ok(classification) => {
            tracker.advance(SheetStage::Done);
            let mut result = SheetResult::success(meta, classification, *thresholds);
            let stats = statistics::summarize(&result);
            info!(
                "Sheet {} graded: {} filled, {} empty, {} ambiguous",
                result.sheet_id(),
                stats.filled_count,
                stats.empty_count,
                stats.ambiguous_count
            );
            result.statistics = Some(stats);
            result
        }
        Err(e) => {
            let reason = e.to_string();
            warn!("Sheet {} failed: {}", meta.sheet_id, reason);
            tracker.advance(SheetStage::Failed(reason.clone()));
            SheetResult::failed(meta, *thresholds, reason)
        }
    }
}

fn grade(
    tracker: &mut StageTracker<'_>,
    image: &RasterImage,
    coords: &CoordinateMap,
    thresholds: &Thresholds,
    sink: Option<&dyn DiagnosticSink>,
) -> Result<Classification, SheetError> {
    tracker.advance(SheetStage::Decoding);
    let mask = preprocess(image)?;

    tracker.advance(SheetStage::Classifying);
    let classification = match sink {
        Some(sink) => {
            let sheet_id = tracker.sheet_id;
            classify_with(&mask, coords, thresholds, |region| {
                match catch_unwind(AssertUnwindSafe(|| sink.emit(sheet_id, region))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        "Sheet {} q{} {}: {}",
                        sheet_id, region.question, region.option, e
                    ),
                    Err(_) => warn!(
                        "Sheet {} q{} {}: diagnostic sink panicked",
                        sheet_id, region.question, region.option
                    ),
                }
            })?
        }
        None => classify(&mask, coords, thresholds)?,
    };

    Ok(classification)
}

/// Tracks one sheet's stage and logs every transition.
struct StageTracker<'a> {
    sheet_id: &'a str,
    stage: SheetStage,
}

impl<'a> StageTracker<'a> {
    fn new(sheet_id: &'a str) -> Self {
        Self {
            sheet_id,
            stage: SheetStage::Pending,
        }
    }

    fn advance(&mut self, next: SheetStage) {
        debug_assert!(
            self.stage.can_advance_to(&next),
            "illegal sheet transition {} -> {}",
            self.stage,
            next
        );
        debug!("Sheet {}: {} -> {}", self.sheet_id, self.stage, next);
        self.stage = next;
    }
}

fn log_batch_complete(batch: &BatchResult) {
    info!(
        "Batch complete: {}/{} sheets graded, {} failed",
        batch.success_count,
        batch.total(),
        batch.failure_count
    );
    for (sheet_id, reason) in batch.failures() {
        info!("  failed {}: {}", sheet_id, reason);
    }
}

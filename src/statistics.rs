//! Per-sheet and per-batch answer counts

use crate::batch::BatchResult;
use crate::classifier::QuestionOutcome;
use crate::sheet::SheetResult;
use serde::Serialize;

/// How often one option was chosen on a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCount {
    pub option: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetStatistics {
    pub total_questions: usize,
    pub filled_count: usize,
    pub empty_count: usize,
    pub ambiguous_count: usize,
    /// Filled answers per option, every declared option listed in order
    pub option_distribution: Vec<OptionCount>,
}

/// Count outcomes of one sheet. A failed sheet summarizes to all zeros.
pub fn summarize(result: &SheetResult) -> SheetStatistics {
    let mut stats = SheetStatistics {
        total_questions: result.answers.len(),
        ..Default::default()
    };

    for sample in &result.samples {
        if !stats
            .option_distribution
            .iter()
            .any(|entry| entry.option == sample.option)
        {
            stats.option_distribution.push(OptionCount {
                option: sample.option.clone(),
                count: 0,
            });
        }
    }

    for answer in &result.answers {
        match &answer.outcome {
            QuestionOutcome::Empty => stats.empty_count += 1,
            QuestionOutcome::Ambiguous => stats.ambiguous_count += 1,
            QuestionOutcome::Filled(option) => {
                stats.filled_count += 1;
                match stats
                    .option_distribution
                    .iter_mut()
                    .find(|entry| &entry.option == option)
                {
                    Some(entry) => entry.count += 1,
                    None => stats.option_distribution.push(OptionCount {
                        option: option.clone(),
                        count: 1,
                    }),
                }
            }
        }
    }

    stats
}

/// Batch-wide averages over successfully graded sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_sheets: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub average_filled: f64,
    pub average_empty: f64,
    pub average_ambiguous: f64,
}

pub fn summarize_batch(batch: &BatchResult) -> BatchSummary {
    let mut summary = BatchSummary {
        total_sheets: batch.sheets.len(),
        success_count: batch.success_count,
        failure_count: batch.failure_count,
        ..Default::default()
    };
    if batch.success_count == 0 {
        return summary;
    }

    let (mut filled, mut empty, mut ambiguous) = (0usize, 0usize, 0usize);
    for stats in batch.sheets.iter().filter_map(|s| s.statistics.as_ref()) {
        filled += stats.filled_count;
        empty += stats.empty_count;
        ambiguous += stats.ambiguous_count;
    }

    let n = batch.success_count as f64;
    summary.average_filled = filled as f64 / n;
    summary.average_empty = empty as f64 / n;
    summary.average_ambiguous = ambiguous as f64 / n;
    summary
}

//! Bubble fill measurement and per-question decisions
//!
//! For every declared bubble a square of side `2 * radius`, clipped to the
//! mask, is sampled around its center. The fill ratio is the share of ink
//! pixels in that square. Per question the option with the highest ratio is
//! selected (first declared wins ties) and [`Thresholds::decide`] maps the
//! selected ratio to an outcome:
//!
//! - `ratio < empty`  → [`QuestionOutcome::Empty`]
//! - `ratio >= fill`  → [`QuestionOutcome::Filled`]
//! - otherwise        → [`QuestionOutcome::Ambiguous`]
//!
//! A question where every option measures exactly zero is always empty.
//! Classification reads nothing but the mask, the coordinate map and the
//! threshold pair it is given.

use crate::error::{ClassificationError, ConfigError};
use crate::layout::{CoordinateMap, Point};
use crate::preprocessing::BinaryMask;
use serde::{Deserialize, Serialize};

/// Validated `(empty, fill)` decision pair with `empty <= fill`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct Thresholds {
    #[serde(rename = "empty_threshold")]
    empty: f64,
    #[serde(rename = "fill_threshold")]
    fill: f64,
}

#[derive(Deserialize)]
struct RawThresholds {
    empty_threshold: f64,
    fill_threshold: f64,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = ConfigError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(raw.empty_threshold, raw.fill_threshold)
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            empty: 0.10,
            fill: 0.30,
        }
    }
}

impl Thresholds {
    pub fn new(empty: f64, fill: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&empty) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "empty_threshold",
                value: empty,
            });
        }
        if !(0.0..=1.0).contains(&fill) {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "fill_threshold",
                value: fill,
            });
        }
        if empty > fill {
            return Err(ConfigError::ThresholdOrder { empty, fill });
        }
        Ok(Self { empty, fill })
    }

    pub fn empty(&self) -> f64 {
        self.empty
    }

    pub fn fill(&self) -> f64 {
        self.fill
    }

    /// Outcome for a question whose best option `selected` measured `max_ratio`.
    ///
    /// Only the threshold comparison; a question with no ink at all never
    /// gets here (see [`classify_with`]).
    pub fn decide(&self, max_ratio: f64, selected: &str) -> QuestionOutcome {
        if max_ratio < self.empty {
            QuestionOutcome::Empty
        } else if max_ratio >= self.fill {
            QuestionOutcome::Filled(selected.to_string())
        } else {
            QuestionOutcome::Ambiguous
        }
    }
}

/// Decision for one question on one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "status", content = "option", rename_all = "snake_case")]
pub enum QuestionOutcome {
    Empty,
    Filled(String),
    Ambiguous,
}

impl QuestionOutcome {
    /// Option label when the question is filled.
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Filled(option) => Some(option),
            _ => None,
        }
    }
}

/// Measured fill ratio of one bubble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillSample {
    pub question: u32,
    pub option: String,
    pub ratio: f64,
}

/// Outcome of one question plus the reading that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAnswer {
    pub question: u32,
    pub outcome: QuestionOutcome,
    /// Highest-ratio option; `None` when no option had any ink
    pub selected: Option<String>,
    pub max_ratio: f64,
}

/// Every answer and every sample of a sheet, in question then option order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub answers: Vec<QuestionAnswer>,
    pub samples: Vec<FillSample>,
}

/// One sampled bubble region, handed to observers while classifying.
#[derive(Debug, Clone, Copy)]
pub struct BubbleRegion<'a> {
    pub question: u32,
    pub option: &'a str,
    pub center: Point,
    pub width: u32,
    pub height: u32,
    /// Row-major mask values (0 or 1), `width * height` long
    pub pixels: &'a [u8],
    pub ratio: f64,
}

/// Reusable buffer for bubble regions, sized for a `2r x 2r` square clipped to the mask.
#[derive(Debug, Default)]
pub struct RegionScratch {
    buf: Vec<u8>,
    width: u32,
    height: u32,
}

impl RegionScratch {
    /// Scratch for regions of `radius` inside a mask of `bounds` (width, height).
    pub fn new(radius: u32, bounds: (u32, u32)) -> Self {
        let side = u64::from(radius) * 2;
        let (width, height) = bounds;
        // Never more than the mask itself holds
        let capacity = side.min(u64::from(width)) * side.min(u64::from(height));
        Self {
            buf: Vec::with_capacity(capacity as usize),
            width: 0,
            height: 0,
        }
    }

    /// Copy the clipped region around `center` into the buffer and return its fill ratio.
    ///
    /// A region that falls entirely outside the mask is empty and measures 0.
    pub fn sample(&mut self, mask: &BinaryMask, center: Point, radius: u32) -> f64 {
        let (mask_w, mask_h) = mask.dimensions();
        let r = i64::from(radius);
        let x0 = (i64::from(center.x) - r).max(0);
        let x1 = (i64::from(center.x) + r).min(i64::from(mask_w));
        let y0 = (i64::from(center.y) - r).max(0);
        let y1 = (i64::from(center.y) + r).min(i64::from(mask_h));

        self.buf.clear();
        if x1 <= x0 || y1 <= y0 {
            self.width = 0;
            self.height = 0;
            return 0.0;
        }

        // Bounds are clamped to the mask above, so the casts are lossless.
        let (x0, x1, y0, y1) = (x0 as u32, x1 as u32, y0 as u32, y1 as u32);
        for y in y0..y1 {
            self.buf.extend_from_slice(mask.row_span(y, x0, x1));
        }
        self.width = x1 - x0;
        self.height = y1 - y0;

        let ink = self.buf.iter().filter(|&&v| v == 1).count();
        ink as f64 / self.buf.len() as f64
    }

    pub fn pixels(&self) -> &[u8] {
        &self.buf
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Classify every question of a sheet.
pub fn classify(
    mask: &BinaryMask,
    coords: &CoordinateMap,
    thresholds: &Thresholds,
) -> Result<Classification, ClassificationError> {
    classify_with(mask, coords, thresholds, |_| {})
}

/// Like [`classify`], also showing every sampled region to `observer`.
///
/// The observer cannot influence the result.
pub fn classify_with<F>(
    mask: &BinaryMask,
    coords: &CoordinateMap,
    thresholds: &Thresholds,
    mut observer: F,
) -> Result<Classification, ClassificationError>
where
    F: FnMut(&BubbleRegion<'_>),
{
    let options = coords.options();
    let radius = coords.radius();
    let mut scratch = RegionScratch::new(radius, mask.dimensions());
    let mut answers = Vec::with_capacity(coords.question_count() as usize);
    let mut samples = Vec::with_capacity(coords.question_count() as usize * options.len());

    for question in coords.questions() {
        let mut best: Option<(usize, f64)> = None;

        for (index, option) in options.iter().enumerate() {
            let center = coords.center(question, index).ok_or_else(|| {
                ClassificationError::MissingCoordinate {
                    question,
                    option: option.clone(),
                }
            })?;

            let ratio = scratch.sample(mask, center, radius);
            let (width, height) = scratch.dimensions();
            observer(&BubbleRegion {
                question,
                option,
                center,
                width,
                height,
                pixels: scratch.pixels(),
                ratio,
            });

            // Strict comparison keeps the first declared option on ties
            if best.map_or(true, |(_, top)| ratio > top) {
                best = Some((index, ratio));
            }
            samples.push(FillSample {
                question,
                option: option.clone(),
                ratio,
            });
        }

        let (selected, max_ratio) = match best {
            Some((index, ratio)) if ratio > 0.0 => (Some(options[index].clone()), ratio),
            _ => (None, 0.0),
        };
        let outcome = match &selected {
            Some(option) => thresholds.decide(max_ratio, option),
            None => QuestionOutcome::Empty,
        };

        tracing::trace!(
            "Question {}: max {:.3} ({:?}) -> {:?}",
            question,
            max_ratio,
            selected,
            outcome
        );

        answers.push(QuestionAnswer {
            question,
            outcome,
            selected,
            max_ratio,
        });
    }

    Ok(Classification { answers, samples })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ColumnGeometry, FormLayout};

    const RADIUS: u32 = 10;

    /// Two questions, options a-e, one column; every region is 20x20 = 400 px.
    fn test_layout() -> FormLayout {
        FormLayout {
            question_count: 2,
            options: ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect(),
            columns: vec![ColumnGeometry {
                origin_x: 20,
                origin_y: 20,
                option_spacing: 30,
            }],
            rows_per_column: 2,
            row_spacing: 30,
            radius: RADIUS,
        }
    }

    fn coords() -> CoordinateMap {
        CoordinateMap::build(&test_layout()).unwrap()
    }

    fn blank_mask() -> BinaryMask {
        BinaryMask::blank(170, 70)
    }

    /// Ink the top `rows` rows of the bubble's region (20 px each).
    fn ink_rows(mask: &mut BinaryMask, coords: &CoordinateMap, question: u32, option: &str, rows: u32) {
        let center = coords.center_of(question, option).unwrap();
        for y in center.y - RADIUS..center.y - RADIUS + rows {
            for x in center.x - RADIUS..center.x + RADIUS {
                mask.set(x, y, true);
            }
        }
    }

    fn outcome(result: &Classification, question: u32) -> &QuestionOutcome {
        &result.answers[(question - 1) as usize].outcome
    }

    fn thresholds(empty: f64, fill: f64) -> Thresholds {
        Thresholds::new(empty, fill).unwrap()
    }

    #[test]
    fn test_blank_sheet_is_all_empty() {
        let result = classify(&blank_mask(), &coords(), &Thresholds::default()).unwrap();

        assert_eq!(result.answers.len(), 2);
        assert!(result
            .answers
            .iter()
            .all(|a| a.outcome == QuestionOutcome::Empty && a.selected.is_none()));
        assert_eq!(result.samples.len(), 10);
        assert!(result.samples.iter().all(|s| s.ratio == 0.0));
    }

    #[test]
    fn test_clear_mark_is_filled() {
        let coords = coords();
        let mut mask = blank_mask();
        ink_rows(&mut mask, &coords, 1, "c", 16); // 0.80
        for option in ["a", "b", "d", "e"] {
            ink_rows(&mut mask, &coords, 1, option, 1); // 0.05
        }

        let result = classify(&mask, &coords, &thresholds(0.10, 0.30)).unwrap();

        assert_eq!(outcome(&result, 1), &QuestionOutcome::Filled("c".to_string()));
        assert_eq!(result.answers[0].max_ratio, 0.8);
        assert_eq!(result.samples[0].ratio, 0.05);
        assert_eq!(outcome(&result, 2), &QuestionOutcome::Empty);
    }

    #[test]
    fn test_faint_mark_is_ambiguous() {
        let coords = coords();
        let mut mask = blank_mask();
        ink_rows(&mut mask, &coords, 2, "d", 4); // 0.20

        let result = classify(&mask, &coords, &thresholds(0.10, 0.30)).unwrap();

        assert_eq!(outcome(&result, 2), &QuestionOutcome::Ambiguous);
        assert_eq!(result.answers[1].selected.as_deref(), Some("d"));
    }

    #[test]
    fn test_tie_resolves_to_first_declared_option() {
        let coords = coords();
        let mut mask = blank_mask();
        ink_rows(&mut mask, &coords, 1, "a", 10); // 0.5
        ink_rows(&mut mask, &coords, 1, "b", 10); // 0.5
        ink_rows(&mut mask, &coords, 2, "d", 10);
        ink_rows(&mut mask, &coords, 2, "b", 10);

        let result = classify(&mask, &coords, &thresholds(0.1, 0.3)).unwrap();

        assert_eq!(outcome(&result, 1), &QuestionOutcome::Filled("a".to_string()));
        assert_eq!(outcome(&result, 2), &QuestionOutcome::Filled("b".to_string()));
    }

    #[test]
    fn test_ratio_equal_to_empty_threshold_is_not_empty() {
        let coords = coords();
        let mut mask = blank_mask();
        ink_rows(&mut mask, &coords, 1, "a", 1); // 0.05

        let result = classify(&mask, &coords, &thresholds(0.05, 0.30)).unwrap();
        assert_eq!(outcome(&result, 1), &QuestionOutcome::Ambiguous);

        let result = classify(&mask, &coords, &thresholds(0.05, 0.05)).unwrap();
        assert_eq!(outcome(&result, 1), &QuestionOutcome::Filled("a".to_string()));
    }

    #[test]
    fn test_all_zero_is_empty_even_with_zero_thresholds() {
        let result = classify(&blank_mask(), &coords(), &thresholds(0.0, 0.0)).unwrap();
        assert!(result
            .answers
            .iter()
            .all(|a| a.outcome == QuestionOutcome::Empty));
    }

    #[test]
    fn test_region_outside_mask_measures_zero() {
        let coords = coords();
        // Only question 1 lies inside this mask
        let mut mask = BinaryMask::blank(170, 35);
        ink_rows(&mut mask, &coords, 1, "e", 12);

        let result = classify(&mask, &coords, &thresholds(0.1, 0.3)).unwrap();

        assert_eq!(outcome(&result, 1), &QuestionOutcome::Filled("e".to_string()));
        assert_eq!(outcome(&result, 2), &QuestionOutcome::Empty);
        assert!(result.samples[5..].iter().all(|s| s.ratio == 0.0));
    }

    #[test]
    fn test_region_is_clipped_at_border() {
        let mask = BinaryMask::from_fn(40, 40, |_, _| true);
        let mut scratch = RegionScratch::new(RADIUS, mask.dimensions());

        let ratio = scratch.sample(&mask, Point { x: 5, y: 35 }, RADIUS);

        assert_eq!(ratio, 1.0);
        assert_eq!(scratch.dimensions(), (15, 15));
        assert_eq!(scratch.pixels().len(), 225);
    }

    #[test]
    fn test_scratch_is_reused_without_growing() {
        let mask = blank_mask();
        let mut scratch = RegionScratch::new(RADIUS, mask.dimensions());
        let capacity = scratch.buf.capacity();

        for x in [20, 50, 80, 110, 140] {
            scratch.sample(&mask, Point { x, y: 20 }, RADIUS);
        }

        assert_eq!(scratch.buf.capacity(), capacity);
    }

    #[test]
    fn test_huge_radius_scratch_is_bounded_by_mask() {
        let mask = BinaryMask::from_fn(40, 30, |x, _| x < 20);
        let mut scratch = RegionScratch::new(u32::MAX / 2, mask.dimensions());
        assert!(scratch.buf.capacity() < 1 << 16);

        let ratio = scratch.sample(&mask, Point { x: 20, y: 15 }, u32::MAX / 2);

        assert_eq!(scratch.dimensions(), (40, 30));
        assert_eq!(ratio, 0.5);
    }

    #[test]
    fn test_observer_sees_every_bubble() {
        let coords = coords();
        let mut mask = blank_mask();
        ink_rows(&mut mask, &coords, 1, "b", 20);
        let mut seen = Vec::new();

        classify_with(&mask, &coords, &Thresholds::default(), |region| {
            assert_eq!(region.pixels.len(), (region.width * region.height) as usize);
            seen.push((region.question, region.option.to_string(), region.ratio));
        })
        .unwrap();

        assert_eq!(seen.len(), 10);
        assert_eq!(seen[1], (1, "b".to_string(), 1.0));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let coords = coords();
        let mut mask = blank_mask();
        ink_rows(&mut mask, &coords, 1, "c", 7);
        ink_rows(&mut mask, &coords, 2, "a", 13);
        let thresholds = thresholds(0.1, 0.3);

        let first = classify(&mask, &coords, &thresholds).unwrap();
        let second = classify(&mask, &coords, &thresholds).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_decision_policy_over_ratio_sweep() {
        let coords = coords();
        let thresholds = thresholds(0.10, 0.30);

        for rows in 0..=20 {
            let mut mask = blank_mask();
            ink_rows(&mut mask, &coords, 1, "a", rows);
            let ratio = f64::from(rows) / 20.0;

            let result = classify(&mask, &coords, &thresholds).unwrap();
            let expected = if ratio < 0.10 {
                QuestionOutcome::Empty
            } else if ratio >= 0.30 {
                QuestionOutcome::Filled("a".to_string())
            } else {
                QuestionOutcome::Ambiguous
            };
            assert_eq!(outcome(&result, 1), &expected, "rows = {}", rows);
        }
    }

    #[test]
    fn test_decide_compares_thresholds_only() {
        let policy = thresholds(0.10, 0.30);
        assert_eq!(policy.decide(0.09, "a"), QuestionOutcome::Empty);
        assert_eq!(policy.decide(0.10, "a"), QuestionOutcome::Ambiguous);
        assert_eq!(policy.decide(0.30, "b"), QuestionOutcome::Filled("b".to_string()));

        // The no-ink rule belongs to classification, not to the threshold pair
        let zero = thresholds(0.0, 0.0);
        assert_eq!(zero.decide(0.0, "c"), QuestionOutcome::Filled("c".to_string()));
    }

    #[test]
    fn test_thresholds_validate_order_and_range() {
        assert_eq!(
            Thresholds::new(0.4, 0.3),
            Err(ConfigError::ThresholdOrder {
                empty: 0.4,
                fill: 0.3
            })
        );
        assert!(Thresholds::new(-0.1, 0.3).is_err());
        assert!(Thresholds::new(0.1, 1.5).is_err());
        assert!(Thresholds::new(f64::NAN, 0.3).is_err());
        assert!(Thresholds::new(0.3, 0.3).is_ok());
    }

    #[test]
    fn test_thresholds_deserialize_through_validation() {
        let ok: Thresholds =
            serde_json::from_str(r#"{"empty_threshold":0.15,"fill_threshold":0.4}"#).unwrap();
        assert_eq!(ok.empty(), 0.15);

        let bad = serde_json::from_str::<Thresholds>(r#"{"empty_threshold":0.5,"fill_threshold":0.4}"#);
        assert!(bad.is_err());
    }
}

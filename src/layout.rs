//! Answer sheet geometry
//!
//! A [`FormLayout`] describes where the bubbles are printed; [`CoordinateMap`]
//! is the derived lookup from (question, option) to pixel center. The map is
//! built once per run and shared read-only between sheet workers.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placement of one column of questions on the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnGeometry {
    /// X of the first option bubble in this column
    pub origin_x: u32,
    /// Y of the first question row in this column
    pub origin_y: u32,
    /// Horizontal distance between neighbouring option bubbles
    pub option_spacing: u32,
}

/// Layout parameters of a printed answer sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormLayout {
    pub question_count: u32,
    /// Option labels in declaration order; order decides tie-breaks
    pub options: Vec<String>,
    /// Columns fill left to right, `rows_per_column` questions each
    pub columns: Vec<ColumnGeometry>,
    pub rows_per_column: u32,
    pub row_spacing: u32,
    /// Half side of the square sampled around each bubble center
    pub radius: u32,
}

impl Default for FormLayout {
    /// The stock 20-question, five-option sheet in two columns.
    fn default() -> Self {
        Self {
            question_count: 20,
            options: ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect(),
            columns: vec![
                ColumnGeometry {
                    origin_x: 170,
                    origin_y: 115,
                    option_spacing: 30,
                },
                ColumnGeometry {
                    origin_x: 500,
                    origin_y: 115,
                    option_spacing: 30,
                },
            ],
            rows_per_column: 10,
            row_spacing: 30,
            radius: 12,
        }
    }
}

impl FormLayout {
    /// Check every structural invariant of the layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.question_count == 0 {
            return Err(ConfigError::NoQuestions);
        }
        if self.options.is_empty() {
            return Err(ConfigError::NoOptions);
        }
        let mut seen = HashSet::new();
        for label in &self.options {
            if label.is_empty() {
                return Err(ConfigError::EmptyOptionLabel);
            }
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::DuplicateOption(label.clone()));
            }
        }
        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }

        let capacity = u64::from(self.rows_per_column) * self.columns.len() as u64;
        if capacity < u64::from(self.question_count) {
            return Err(ConfigError::TooManyQuestions {
                questions: self.question_count,
                columns: self.columns.len(),
                rows: self.rows_per_column,
            });
        }

        if self.radius == 0 {
            return Err(ConfigError::ZeroRadius);
        }
        let spacing = self.min_spacing();
        if u64::from(self.radius) * 2 >= u64::from(spacing) {
            return Err(ConfigError::OverlappingBubbles {
                radius: self.radius,
                spacing,
            });
        }

        // Farthest sampled pixel of every column must be addressable
        let rows_used = self.rows_per_column.min(self.question_count);
        let last_option = u32::try_from(self.options.len() - 1).ok();
        for (index, column) in self.columns.iter().enumerate() {
            let far_x = last_option
                .and_then(|n| n.checked_mul(column.option_spacing))
                .and_then(|dx| dx.checked_add(column.origin_x))
                .and_then(|x| x.checked_add(self.radius));
            let far_y = (rows_used - 1)
                .checked_mul(self.row_spacing)
                .and_then(|dy| dy.checked_add(column.origin_y))
                .and_then(|y| y.checked_add(self.radius));
            if far_x.is_none() || far_y.is_none() {
                return Err(ConfigError::GeometryOverflow { column: index });
            }
        }

        Ok(())
    }

    /// Smallest distance between two neighbouring bubble centers.
    fn min_spacing(&self) -> u32 {
        self.columns
            .iter()
            .map(|c| c.option_spacing)
            .fold(self.row_spacing, u32::min)
    }
}

/// Pixel position of a bubble center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Immutable (question, option) → center lookup derived from a [`FormLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateMap {
    question_count: u32,
    options: Vec<String>,
    radius: u32,
    /// Row-major: question-major, then option in declaration order
    centers: Vec<Point>,
}

impl CoordinateMap {
    /// Derive every bubble center from the layout.
    pub fn build(layout: &FormLayout) -> Result<Self, ConfigError> {
        layout.validate()?;

        let option_count = layout.options.len();
        let mut centers = Vec::with_capacity(layout.question_count as usize * option_count);

        // validate() bounds every center below, so plain arithmetic cannot overflow
        for index in 0..layout.question_count {
            let column = &layout.columns[(index / layout.rows_per_column) as usize];
            let row = index % layout.rows_per_column;
            let y = column.origin_y + row * layout.row_spacing;
            for option in 0..option_count as u32 {
                centers.push(Point {
                    x: column.origin_x + option * column.option_spacing,
                    y,
                });
            }
        }

        tracing::debug!(
            "Built coordinate map: {} questions x {} options, radius {}",
            layout.question_count,
            option_count,
            layout.radius
        );

        Ok(Self {
            question_count: layout.question_count,
            options: layout.options.clone(),
            radius: layout.radius,
            centers,
        })
    }

    pub fn question_count(&self) -> u32 {
        self.question_count
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Question numbers as printed on the sheet (1-based).
    pub fn questions(&self) -> impl Iterator<Item = u32> {
        1..=self.question_count
    }

    /// Center of `option_index` for the 1-based `question`.
    pub fn center(&self, question: u32, option_index: usize) -> Option<Point> {
        if question == 0 || question > self.question_count || option_index >= self.options.len()
        {
            return None;
        }
        let slot = (question - 1) as usize * self.options.len() + option_index;
        self.centers.get(slot).copied()
    }

    /// Center looked up by option label.
    pub fn center_of(&self, question: u32, option: &str) -> Option<Point> {
        let index = self.options.iter().position(|o| o == option)?;
        self.center(question, index)
    }
}

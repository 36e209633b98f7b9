//! Single-sheet input and result types

use crate::classifier::{Classification, FillSample, QuestionAnswer, Thresholds};
use crate::preprocessing::RasterImage;
use crate::statistics::SheetStatistics;
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Identifier used when the sheet's file name doesn't carry one.
pub const UNKNOWN_SHEET_ID: &str = "unknown";

/// Student identity encoded in a file name `<class_section>_<student_id>_<full_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetIdentity {
    pub class_section: String,
    pub student_id: String,
    pub full_name: String,
}

impl SheetIdentity {
    /// Parse the identity from a file name; directory and extension are ignored.
    ///
    /// The full name may itself contain underscores.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = Path::new(name).file_stem()?.to_str()?;
        let mut parts = stem.splitn(3, '_').map(str::trim);

        let class_section = parts.next().filter(|p| !p.is_empty())?;
        let student_id = parts.next().filter(|p| !p.is_empty())?;
        let full_name = parts.next().filter(|p| !p.is_empty())?;

        Some(Self {
            class_section: class_section.to_string(),
            student_id: student_id.to_string(),
            full_name: full_name.replace('_', " "),
        })
    }
}

/// Who a sheet belongs to and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetMeta {
    pub sheet_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<SheetIdentity>,
}

impl SheetMeta {
    pub fn new(sheet_id: impl Into<String>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            source_name: None,
            identity: None,
        }
    }

    /// Derive the sheet id (student id) from the file name.
    ///
    /// A malformed name is only a warning: the sheet is still graded under
    /// [`UNKNOWN_SHEET_ID`].
    pub fn from_file_name(name: &str) -> Self {
        let identity = SheetIdentity::from_file_name(name);
        let sheet_id = match &identity {
            Some(identity) => identity.student_id.clone(),
            None => {
                tracing::warn!(
                    "Sheet file name {:?} doesn't match <class_section>_<student_id>_<full_name>",
                    name
                );
                UNKNOWN_SHEET_ID.to_string()
            }
        };
        Self {
            sheet_id,
            source_name: Some(name.to_string()),
            identity,
        }
    }
}

/// One sheet waiting to be graded.
#[derive(Debug, Clone)]
pub struct SheetInput {
    pub meta: SheetMeta,
    pub image: RasterImage,
}

impl SheetInput {
    pub fn new(sheet_id: impl Into<String>, image: impl Into<RasterImage>) -> Self {
        Self {
            meta: SheetMeta::new(sheet_id),
            image: image.into(),
        }
    }

    pub fn from_file_name(name: &str, image: impl Into<RasterImage>) -> Self {
        Self {
            meta: SheetMeta::from_file_name(name),
            image: image.into(),
        }
    }
}

/// Processing stage of a sheet. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetStage {
    Pending,
    Decoding,
    Classifying,
    Done,
    Failed(String),
}

impl SheetStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Terminal stages never change again.
    pub fn can_advance_to(&self, next: &SheetStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Decoding)
                | (Self::Decoding, Self::Classifying)
                | (Self::Classifying, Self::Done)
                | (_, Self::Failed(_))
        )
    }
}

impl fmt::Display for SheetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Decoding => write!(f, "decoding"),
            Self::Classifying => write!(f, "classifying"),
            Self::Done => write!(f, "done"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Final status of a graded sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Failed { reason: String },
}

/// Everything known about one processed sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetResult {
    #[serde(flatten)]
    pub meta: SheetMeta,
    #[serde(flatten)]
    pub status: ProcessingStatus,
    pub answers: Vec<QuestionAnswer>,
    /// Every bubble's fill ratio, question then option order
    pub samples: Vec<FillSample>,
    /// Thresholds the answers were decided with
    pub thresholds: Thresholds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SheetStatistics>,
}

impl SheetResult {
    pub fn success(meta: SheetMeta, classification: Classification, thresholds: Thresholds) -> Self {
        Self {
            meta,
            status: ProcessingStatus::Success,
            answers: classification.answers,
            samples: classification.samples,
            thresholds,
            statistics: None,
        }
    }

    pub fn failed(meta: SheetMeta, thresholds: Thresholds, reason: String) -> Self {
        Self {
            meta,
            status: ProcessingStatus::Failed { reason },
            answers: Vec::new(),
            samples: Vec::new(),
            thresholds,
            statistics: None,
        }
    }

    pub fn sheet_id(&self) -> &str {
        &self.meta.sheet_id
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Success
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            ProcessingStatus::Failed { reason } => Some(reason),
            ProcessingStatus::Success => None,
        }
    }
}

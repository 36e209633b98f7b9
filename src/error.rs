use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Invalid form layout or threshold configuration.
///
/// Always fatal: a batch never starts with a configuration that fails here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Form layout must declare at least one question")]
    NoQuestions,

    #[error("Form layout must declare at least one option label")]
    NoOptions,

    #[error("Option label must not be empty")]
    EmptyOptionLabel,

    #[error("Duplicate option label: {0}")]
    DuplicateOption(String),

    #[error("Form layout must declare at least one column")]
    NoColumns,

    #[error("{rows} rows per column across {columns} columns cannot hold {questions} questions")]
    TooManyQuestions {
        questions: u32,
        columns: usize,
        rows: u32,
    },

    #[error("Sampling radius must be positive")]
    ZeroRadius,

    #[error("Sampling radius {radius} must be less than half the minimum spacing {spacing}")]
    OverlappingBubbles { radius: u32, spacing: u32 },

    #[error("Bubble grid of column {column} extends past the largest pixel coordinate")]
    GeometryOverflow { column: usize },

    #[error("Threshold {name} must lie within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("Empty threshold {empty} must not exceed fill threshold {fill}")]
    ThresholdOrder { empty: f64, fill: f64 },

    #[error("Failed to load layout file: {0}")]
    LayoutFile(String),
}

/// Raster input that cannot be turned into a binary mask.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Internal invariant violation while classifying a sheet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("No bubble coordinate for question {question}, option {option}")]
    MissingCoordinate { question: u32, option: String },
}

/// Anything that turns a single sheet into `Failed`.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error("Sheet worker failed: {0}")]
    Worker(String),
}

/// Failure to store a diagnostic artifact. Never affects grading.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Diagnostic write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode diagnostic image: {0}")]
    Encode(String),
}

/// Errors surfaced by the HTTP service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Image too large: {size} bytes (max: {max} bytes)")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServiceError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            ServiceError::ImageTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE")
            }
            ServiceError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            ServiceError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

use crate::batch::{BatchPipeline, BatchResult};
use crate::classifier::Thresholds;
use crate::config::Config;
use crate::diagnostics::DirectorySink;
use crate::error::ServiceError;
use crate::layout::FormLayout;
use crate::sheet::{SheetInput, UNKNOWN_SHEET_ID};
use crate::statistics::BatchSummary;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

/// Image encodings accepted on `/grade`
pub const SUPPORTED_FORMATS: &[&str] = &["image/png", "image/jpeg", "image/bmp", "image/tiff"];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<BatchPipeline>,
    pub config: Arc<Config>,
}

/// Grading response
#[derive(Serialize)]
pub struct GradeResponse {
    pub batch: BatchResult,
    pub summary: BatchSummary,
    pub processing_time_ms: u64,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub supported_formats: Vec<String>,
    pub max_file_size_bytes: usize,
    pub layout: FormLayout,
    pub thresholds: Thresholds,
    pub diagnostics: bool,
    pub workers: usize,
}

impl AppState {
    /// Build the grading pipeline; fails on an invalid layout before serving anything.
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        let mut pipeline = BatchPipeline::new(&config.grading)?;

        if config.grading.diagnostics {
            match DirectorySink::new(&config.diagnostics_dir) {
                Ok(sink) => pipeline = pipeline.with_sink(Arc::new(sink)),
                // Grading works without artifacts, so keep serving
                Err(e) => tracing::warn!("Diagnostics disabled: {}", e),
            }
        }

        Ok(Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        })
    }
}

/// Routes of the grading service
pub fn router(state: AppState) -> Router {
    let max_request_size = state.config.max_request_size;

    Router::new()
        .route("/grade", post(handle_grade))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Grade every `file` part of a multipart request as one batch
async fn handle_grade(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GradeResponse>, ServiceError> {
    let start = Instant::now();
    let mut sheets = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            // Ignore unknown fields
            continue;
        }

        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(|e| {
            ServiceError::InvalidRequest(format!("Failed to read file data: {}", e))
        })?;

        if data.len() > state.config.max_file_size {
            return Err(ServiceError::ImageTooLarge {
                size: data.len(),
                max: state.config.max_file_size,
            });
        }

        if let Some(mime) = content_type.as_deref() {
            if !SUPPORTED_FORMATS.contains(&mime) {
                tracing::warn!("Received sheet with content type: {}", mime);
            }
        }

        let input = match file_name {
            Some(name) => SheetInput::from_file_name(&name, data.to_vec()),
            None => SheetInput::new(UNKNOWN_SHEET_ID, data.to_vec()),
        };
        sheets.push(input);
    }

    if sheets.is_empty() {
        return Err(ServiceError::MissingFile);
    }

    let batch = state.pipeline.run(sheets).await;
    let summary = batch.summary();
    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        "Graded {} sheets in {}ms ({} failed)",
        batch.total(),
        processing_time_ms,
        batch.failure_count
    );

    Ok(Json(GradeResponse {
        batch,
        summary,
        processing_time_ms,
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        max_file_size_bytes: state.config.max_file_size,
        layout: state.config.grading.layout.clone(),
        thresholds: state.pipeline.thresholds(),
        diagnostics: state.pipeline.emits_diagnostics(),
        workers: state.pipeline.workers(),
    })
}

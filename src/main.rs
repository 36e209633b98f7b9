use clap::Parser;
use omr_grader::config::{self, Config, GradingConfig};
use omr_grader::layout::{ColumnGeometry, FormLayout};
use omr_grader::{server, Thresholds};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "omr-grader-server")]
#[command(about = "Optical mark recognition service for bubble answer sheets")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OMR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OMR_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum size of one sheet image in bytes (default: 20MB)
    #[arg(long, env = "OMR_MAX_FILE_SIZE", default_value = "20971520")]
    pub max_file_size: usize,

    /// Maximum request body size in bytes (default: 200MB)
    #[arg(long, env = "OMR_MAX_REQUEST_SIZE", default_value = "209715200")]
    pub max_request_size: usize,

    /// JSON form layout; replaces all geometry flags below
    #[arg(long, env = "OMR_LAYOUT_FILE")]
    pub layout_file: Option<PathBuf>,

    /// Number of questions on the sheet
    #[arg(long, env = "OMR_QUESTIONS", default_value = "20")]
    pub questions: u32,

    /// Option labels in printed order
    #[arg(long, env = "OMR_OPTIONS", value_delimiter = ',', default_value = "a,b,c,d,e")]
    pub options: Vec<String>,

    /// X of the first option bubble, one value per column
    #[arg(long, env = "OMR_COLUMN_X", value_delimiter = ',', default_value = "170,500")]
    pub column_x: Vec<u32>,

    /// Y of the first question row (all columns)
    #[arg(long, env = "OMR_ORIGIN_Y", default_value = "115")]
    pub origin_y: u32,

    /// Questions per column
    #[arg(long, env = "OMR_ROWS_PER_COLUMN", default_value = "10")]
    pub rows_per_column: u32,

    /// Vertical distance between question rows in pixels
    #[arg(long, env = "OMR_ROW_SPACING", default_value = "30")]
    pub row_spacing: u32,

    /// Horizontal distance between option bubbles in pixels
    #[arg(long, env = "OMR_OPTION_SPACING", default_value = "30")]
    pub option_spacing: u32,

    /// Half side of the square sampled around each bubble
    #[arg(long, env = "OMR_RADIUS", default_value = "12")]
    pub radius: u32,

    /// Highest fill ratio still read as an empty bubble (exclusive)
    #[arg(long, env = "OMR_EMPTY_THRESHOLD", default_value = "0.10")]
    pub empty_threshold: f64,

    /// Lowest fill ratio read as a filled bubble
    #[arg(long, env = "OMR_FILL_THRESHOLD", default_value = "0.30")]
    pub fill_threshold: f64,

    /// Write one image per sampled bubble region
    #[arg(long, env = "OMR_DIAGNOSTICS")]
    pub diagnostics: bool,

    /// Directory for diagnostic bubble images
    #[arg(long, env = "OMR_DIAGNOSTICS_DIR", default_value = "omr-diagnostics")]
    pub diagnostics_dir: PathBuf,

    /// Sheets graded in parallel (default: available cores)
    #[arg(long, env = "OMR_WORKERS")]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Args {
    fn layout(&self) -> anyhow::Result<FormLayout> {
        if let Some(path) = &self.layout_file {
            return Ok(config::load_layout(path)?);
        }

        Ok(FormLayout {
            question_count: self.questions,
            options: self.options.iter().map(|o| o.trim().to_string()).collect(),
            columns: self
                .column_x
                .iter()
                .map(|&origin_x| ColumnGeometry {
                    origin_x,
                    origin_y: self.origin_y,
                    option_spacing: self.option_spacing,
                })
                .collect(),
            rows_per_column: self.rows_per_column,
            row_spacing: self.row_spacing,
            radius: self.radius,
        })
    }

    fn into_config(self) -> anyhow::Result<Config> {
        let grading = GradingConfig {
            layout: self.layout()?,
            thresholds: Thresholds::new(self.empty_threshold, self.fill_threshold)?,
            diagnostics: self.diagnostics,
            workers: self.workers.unwrap_or_else(config::default_workers),
        };
        grading.validate()?;

        Ok(Config {
            host: self.host,
            port: self.port,
            max_file_size: self.max_file_size,
            max_request_size: self.max_request_size,
            diagnostics_dir: self.diagnostics_dir,
            grading,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.into_config()?;

    tracing::info!("Starting omr-grader-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Binding to {}:{}", config.host, config.port);

    server::run(config).await
}

use std::path::PathBuf;
use std::process::ExitCode;

use chesscal::{CalibrationConfig, CalibrationError, Calibrator};
use clap::Parser;
use log::{error, info, LevelFilter};

#[derive(Parser, Debug)]
#[command(name = "chesscal")]
#[command(about = "Estimate camera intrinsics and lens distortion from chessboard images")]
#[command(version)]
struct Cli {
    /// JSON configuration file; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inner corners along the board width.
    #[arg(long)]
    cols: Option<u32>,

    /// Inner corners along the board height.
    #[arg(long)]
    rows: Option<u32>,

    /// Square edge length in millimetres.
    #[arg(long)]
    square_size: Option<f64>,

    /// Distortion model order: 5, 8, 12 or 14.
    #[arg(long)]
    distortion_order: Option<u32>,

    /// Minimum number of images with a detected board.
    #[arg(long)]
    min_images: Option<usize>,

    /// Directory with the calibration images.
    #[arg(long, default_value = "image")]
    images: PathBuf,

    /// Directory that receives the JSON report.
    #[arg(long, default_value = "result")]
    output_dir: PathBuf,

    /// Detection threads (default: all cores).
    #[arg(long)]
    workers: Option<usize>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Emit structured JSON logs.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,

    /// Write the effective configuration to this path and exit.
    #[arg(long)]
    write_default_config: Option<PathBuf>,
}

impl Cli {
    fn effective_config(&self) -> Result<CalibrationConfig, CalibrationError> {
        let mut config = match &self.config {
            Some(path) => CalibrationConfig::load_json(path)?,
            None => CalibrationConfig::default(),
        };
        if let Some(cols) = self.cols {
            config.cols = cols;
        }
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(square) = self.square_size {
            config.square_size_mm = square;
        }
        if let Some(order) = self.distortion_order {
            config.distortion_order = order;
        }
        if let Some(min_images) = self.min_images {
            config.min_images = min_images;
        }
        if self.workers.is_some() {
            config.max_workers = self.workers;
        }
        Ok(config)
    }
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) {
    chesscal::core::init_tracing(cli.json_logs, &cli.log_level.to_string().to_lowercase());
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) {
    let _ = chesscal::core::init_with_level(cli.log_level);
}

fn run(cli: &Cli) -> Result<(), CalibrationError> {
    let config = cli.effective_config()?;

    if let Some(path) = &cli.write_default_config {
        config.write_json(path)?;
        info!("configuration written to {}", path.display());
        return Ok(());
    }

    let calibrator = Calibrator::from_config(&config)?;
    let plan = calibrator.plan();
    info!(
        "board {}x{} inner corners, {} mm squares, distortion order {}",
        plan.board.cols(),
        plan.board.rows(),
        plan.board.square_size(),
        plan.order
    );

    let outcome = calibrator.run_directory(&cli.images)?;
    let path = outcome.save_report(&cli.output_dir)?;
    println!("{}", outcome.report.summary());
    println!("report: {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if let Some(diagnostics) = e.diagnostics() {
                for failure in &diagnostics.failures {
                    error!("  {}: {}", failure.path.display(), failure.reason);
                }
            }
            if e.suggests_lower_order() {
                error!("try a lower --distortion-order or add images covering the whole field of view");
            }
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

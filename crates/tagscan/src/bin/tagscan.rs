use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use tagscan::{detect, validate_call, DetectorConfig, OutputMatrix, TagDetection, TagScanError};

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("[{id}] {0}", id = .0.identifier())]
    Scan(#[from] TagScanError),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid log level '{0}'")]
    LogLevel(String),
    #[error("{0}")]
    Unavailable(&'static str),
}

#[derive(Parser, Debug)]
#[command(name = "tagscan", version, about = "Detect AprilTags in grayscale images")]
struct Cli {
    /// Log level (error, warn, info, debug, trace, off). With the `tracing`
    /// feature, `RUST_LOG` overrides it when set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect tags and print a JSON report.
    Detect {
        /// 8-bit grayscale image.
        image: PathBuf,
        /// JSON detector configuration; missing fields take defaults.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of positional outputs (id, center, corner_1..corner_4).
        #[arg(long, default_value_t = 6)]
        outputs: usize,
        /// Pretty-print the report.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the default detector configuration as JSON.
    Config,
    /// Render one tag as a PNG.
    Render {
        /// Tag id within the family.
        id: u32,
        /// Output PNG path.
        output: PathBuf,
        /// Pixels per tag bit.
        #[arg(long, default_value_t = 10)]
        scale: usize,
        /// White margin in pixels around the tag.
        #[arg(long, default_value_t = 20)]
        margin: usize,
    },
}

#[derive(Serialize)]
struct DetectReport {
    image_path: String,
    width: usize,
    height: usize,
    count: usize,
    detections: Vec<TagDetection>,
    outputs: BTreeMap<&'static str, OutputMatrix>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) -> Result<(), CliError> {
    let level =
        log::LevelFilter::from_str(level).map_err(|_| CliError::LogLevel(level.to_string()))?;
    #[cfg(feature = "tracing")]
    {
        tagscan::core::init_tracing(level, false);
        Ok(())
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = tagscan::core::level_from_env(level);
        tagscan::core::init_with_level(level)
            .map_err(|_| CliError::Unavailable("logger already set"))
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    init_logging(&cli.log_level)?;
    match cli.command {
        Command::Detect {
            image,
            config,
            outputs,
            pretty,
        } => run_detect(&image, config.as_deref(), outputs, pretty),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&DetectorConfig::default())?);
            Ok(())
        }
        Command::Render {
            id,
            output,
            scale,
            margin,
        } => run_render(id, &output, scale, margin),
    }
}

fn load_config(path: Option<&Path>) -> Result<DetectorConfig, CliError> {
    match path {
        Some(path) => Ok(DetectorConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(DetectorConfig::default()),
    }
}

fn run_detect(
    image_path: &Path,
    config_path: Option<&Path>,
    outputs: usize,
    pretty: bool,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let img = image::open(image_path)?;
    let arg = detect::host_array(&img);
    let (raster, request) = validate_call(std::slice::from_ref(&arg), outputs)?;
    info!(
        "{}: {}x{} raster, {} output(s)",
        image_path.display(),
        raster.width(),
        raster.height(),
        request.container_count()
    );

    let detections = detect_with_backend(&raster, config)?;
    let projected = tagscan::project(detections.clone(), request)?;

    let report = DetectReport {
        image_path: image_path.display().to_string(),
        width: raster.width(),
        height: raster.height(),
        count: detections.len(),
        detections: detections.into_vec(),
        outputs: projected.into_positional().into_iter().collect(),
    };
    let text = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{text}");
    Ok(())
}

#[cfg(feature = "apriltag")]
fn detect_with_backend(
    raster: &tagscan::RasterView<'_>,
    config: DetectorConfig,
) -> Result<tagscan::Detections, CliError> {
    let detector = tagscan::TagDetector::new(tagscan::apriltag::AprilTagBackend, config)?;
    Ok(detector.detect(raster)?)
}

#[cfg(not(feature = "apriltag"))]
fn detect_with_backend(
    _raster: &tagscan::RasterView<'_>,
    _config: DetectorConfig,
) -> Result<tagscan::Detections, CliError> {
    Err(CliError::Unavailable("no detection backend: rebuild tagscan with the `apriltag` feature"))
}

#[cfg(feature = "apriltag")]
fn run_render(id: u32, output: &Path, scale: usize, margin: usize) -> Result<(), CliError> {
    let bitmap =
        tagscan::apriltag::render_tag(tagscan::TagFamily::Tag36h11, id, scale, margin)?;
    let too_large = || CliError::Unavailable("rendered bitmap exceeds PNG dimensions");
    let width = u32::try_from(bitmap.width).map_err(|_| too_large())?;
    let height = u32::try_from(bitmap.height).map_err(|_| too_large())?;
    let img = image::GrayImage::from_raw(width, height, bitmap.data)
        .ok_or(CliError::Unavailable("rendered bitmap has inconsistent size"))?;
    img.save(output)?;
    info!("wrote tag {id} to {}", output.display());
    Ok(())
}

#[cfg(not(feature = "apriltag"))]
fn run_render(_id: u32, _output: &Path, _scale: usize, _margin: usize) -> Result<(), CliError> {
    Err(CliError::Unavailable("tag rendering needs the `apriltag` feature"))
}

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use slideshow_core::pipeline::create_slideshow_use_case::{CreateSlideshowUseCase, RunOutcome};
use slideshow_core::pipeline::infrastructure::threaded_blend_executor::ThreadedBlendExecutor;
use slideshow_core::pipeline::pipeline_logger::LogPipelineLogger;
use slideshow_core::shared::error::{EncodeError, SlideshowError};
use slideshow_core::shared::slideshow_config::SlideshowConfig;
use slideshow_core::video::infrastructure::ffmpeg_encoder::FfmpegEncoder;
use slideshow_core::video::infrastructure::image_directory_scanner::scan_image_directory;
use slideshow_core::video::infrastructure::image_file_reader::ImageFileReader;

const EXIT_FAILURE: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

/// Turn a directory of images into a slideshow video with crossfades.
#[derive(Parser, Debug)]
#[command(name = "slideshow", version)]
struct Cli {
    /// Directory containing the images, shown in file name order.
    input_dir: PathBuf,

    /// Output video file (MP4).
    output: PathBuf,

    /// JSON config file; flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output width in pixels [default: 1920].
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels [default: 1080].
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second [default: 30].
    #[arg(long)]
    fps: Option<u32>,

    /// Seconds each image is on screen, including its crossfade [default: 2.0].
    #[arg(long)]
    slide_duration: Option<f64>,

    /// Seconds of crossfade into the next image [default: 0.5].
    #[arg(long)]
    crossfade_duration: Option<f64>,

    /// JPEG quality of intermediate frames, 1-100 [default: 95].
    #[arg(long)]
    quality: Option<u8>,

    /// Worker threads for transition frames [default: all cores].
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(RunOutcome::Completed { output, .. }) => {
            log::info!("Output written to {}", output.display());
            0
        }
        Ok(RunOutcome::Cancelled) => {
            eprintln!("Cancelled, no output written");
            EXIT_CANCELLED
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FAILURE
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<RunOutcome, Box<dyn std::error::Error>> {
    let config = build_config(&cli)?;
    let inputs = collect_inputs(&cli.input_dir)?;

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    ctrlc::set_handler(move || {
        log::warn!("Cancelling...");
        flag.store(true, Ordering::Relaxed);
    })?;

    let mut use_case = CreateSlideshowUseCase::new(
        Box::new(ImageFileReader::new()),
        Box::new(FfmpegEncoder::new()),
        Box::new(ThreadedBlendExecutor::new(config.workers)),
        Box::new(LogPipelineLogger::new(config.frame_rate as usize)),
        config,
        None,
        None,
        Some(cancelled),
    );

    use_case
        .execute(&inputs, &cli.output)
        .map_err(describe_failure)
}

fn build_config(cli: &Cli) -> Result<SlideshowConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => SlideshowConfig::from_json_file(path)
            .map_err(|e| format!("Could not load config {}: {e}", path.display()))?,
        None => SlideshowConfig::default(),
    };
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut SlideshowConfig, cli: &Cli) {
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if let Some(fps) = cli.fps {
        config.frame_rate = fps;
    }
    if let Some(secs) = cli.slide_duration {
        config.slide_duration_secs = secs;
    }
    if let Some(secs) = cli.crossfade_duration {
        config.crossfade_duration_secs = secs;
    }
    if let Some(quality) = cli.quality {
        config.jpeg_quality = quality;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
}

fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Input directory not found: {}", dir.display()).into());
    }
    let inputs = scan_image_directory(dir)
        .map_err(|e| format!("Could not list {}: {e}", dir.display()))?;
    if inputs.is_empty() {
        return Err(format!("No images found in {}", dir.display()).into());
    }
    log::info!("Found {} images in {}", inputs.len(), dir.display());
    Ok(inputs)
}

fn describe_failure(e: SlideshowError) -> Box<dyn std::error::Error> {
    let mut message = format!("{} failed: {e}", e.stage());
    if let SlideshowError::Encode(EncodeError::Failed { stderr, .. }) = &e {
        if stderr.is_empty() {
            message.push_str("\n(ffmpeg printed no diagnostics)");
        }
    }
    message.into()
}

mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use yolo_lens_core::detection::domain::detection::DetectionResult;
use yolo_lens_core::detection::infrastructure::class_labels::{
    coco_class_names, load_class_names,
};
use yolo_lens_core::detection::infrastructure::execution_provider::ExecutionTarget;
use yolo_lens_core::detection::infrastructure::model_resolver::ProgressFn;
use yolo_lens_core::pipeline::detect_image_use_case::DetectImageUseCase;
use yolo_lens_core::pipeline::detector::{Detector, ModelSpec};
use yolo_lens_core::pipeline::live_feed_use_case::{FeedConfig, LiveFeedUseCase};
use yolo_lens_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use yolo_lens_core::shared::constants::{MIN_CAPTURE_FPS, YOLO_MODEL_NAME};
use yolo_lens_core::shared::geometry::Size;
use yolo_lens_core::shared::orientation::CameraPosition;
use yolo_lens_core::video::infrastructure::image_file_reader::ImageFileReader;
use yolo_lens_core::video::infrastructure::image_file_writer::ImageFileWriter;
use yolo_lens_core::video::infrastructure::image_sequence_source::ImageSequenceSource;

use settings::Settings;

/// YOLO object detection for still images and simulated camera feeds.
#[derive(Parser)]
#[command(name = "yolo-lens")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// Minimum confidence of a detection's top label (0.0-1.0).
    #[arg(long, global = true)]
    label_confidence: Option<f32>,

    /// Minimum overall detection confidence (0.0-1.0).
    #[arg(long, global = true)]
    result_confidence: Option<f32>,

    /// Write the effective settings back to the config file.
    #[arg(long, global = true)]
    save_settings: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ModelArgs {
    /// ONNX model file name.
    #[arg(long, global = true, default_value = YOLO_MODEL_NAME)]
    model: String,

    /// Directory searched for the model before the cache.
    #[arg(long, global = true)]
    bundle_dir: Option<PathBuf>,

    /// Download URL used when the model is neither bundled nor cached.
    #[arg(long, global = true)]
    model_url: Option<String>,

    /// Class names, one per line (default: COCO).
    #[arg(long, global = true)]
    labels: Option<PathBuf>,

    /// Execution target: auto or cpu.
    #[arg(long, global = true)]
    execution: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Detect objects in a single image.
    Detect {
        /// Input image file.
        input: PathBuf,

        /// Width of the view the image is fitted into (default: image width).
        #[arg(long, requires = "view_height")]
        view_width: Option<f64>,

        /// Height of the view the image is fitted into (default: image height).
        #[arg(long, requires = "view_width")]
        view_height: Option<f64>,

        /// Write the view with labelled boxes to this file.
        #[arg(long)]
        annotate: Option<PathBuf>,

        /// Print results as JSON instead of captions.
        #[arg(long)]
        json: bool,
    },
    /// Run the live detection loop over a directory of frames.
    Camera {
        /// Directory of still images played back as camera frames.
        frames: PathBuf,

        /// Camera position: back or front.
        #[arg(long)]
        camera: Option<String>,

        /// Capture rate in frames per second (0 = as fast as possible).
        #[arg(long)]
        fps: Option<f64>,

        /// Detection worker threads.
        #[arg(long)]
        workers: Option<usize>,

        /// Preview width.
        #[arg(long, default_value = "390")]
        view_width: f64,

        /// Preview height.
        #[arg(long, default_value = "844")]
        view_height: f64,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = effective_settings(&cli, Settings::load())?;
    validate(&cli, &settings)?;

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }

    let detector = Arc::new(build_detector(&cli.model, &settings)?);

    match cli.command {
        Command::Detect {
            input,
            view_width,
            view_height,
            annotate,
            json,
        } => {
            let view_size = view_width.zip(view_height).map(|(w, h)| Size::new(w, h));
            run_detect(&input, view_size, annotate.as_deref(), json, detector)
        }
        Command::Camera {
            frames,
            view_width,
            view_height,
            ..
        } => run_camera(&frames, Size::new(view_width, view_height), &settings, detector),
    }
}

fn run_detect(
    input: &Path,
    view_size: Option<Size>,
    annotate: Option<&Path>,
    json: bool,
    detector: Arc<Detector>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case = DetectImageUseCase::new(
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileWriter::new()),
        detector,
        Box::new(StdoutPipelineLogger::default()),
    );
    let outcome = use_case.execute(input, view_size, annotate)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.results)?);
    } else {
        print_results(&outcome.results);
    }
    Ok(())
}

fn run_camera(
    frames: &Path,
    view_size: Size,
    settings: &Settings,
    detector: Arc<Detector>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = ImageSequenceSource::open(frames, Box::new(ImageFileReader::new()), settings.camera)?
        .with_frame_rate(settings.frame_rate);

    let mut config = FeedConfig::new(view_size);
    config.frame_rate = settings.frame_rate;
    config.workers = settings.workers;

    let mut use_case = LiveFeedUseCase::new(
        detector,
        Box::new(StdoutPipelineLogger::default()),
        config,
    );
    let summary = use_case.execute(Box::new(source))?;

    println!(
        "{} frames: {} detected, {} dropped, {} failed, {} results",
        summary.captured, summary.detected, summary.dropped, summary.failed, summary.results
    );
    for label in use_case.overlay().labels() {
        let f = label.frame;
        println!(
            "  {} at ({:.0}, {:.0}) {:.0}x{:.0}",
            label.text, f.x, f.y, f.width, f.height
        );
    }
    Ok(())
}

fn print_results(results: &[DetectionResult]) {
    if results.is_empty() {
        println!("No objects detected");
        return;
    }
    for result in results {
        let b = result.bounding_box;
        println!(
            "{} at ({:.0}, {:.0}) {:.0}x{:.0}",
            result.caption(),
            b.x,
            b.y,
            b.width,
            b.height
        );
    }
}

/// Applies command-line overrides on top of the stored settings.
fn effective_settings(
    cli: &Cli,
    mut settings: Settings,
) -> Result<Settings, Box<dyn std::error::Error>> {
    if let Some(v) = cli.label_confidence {
        settings.label_confidence = v;
    }
    if let Some(v) = cli.result_confidence {
        settings.result_confidence = v;
    }
    if let Some(name) = &cli.model.execution {
        settings.execution = ExecutionTarget::from_name(name).ok_or_else(|| {
            format!("Execution target must be 'auto' or 'cpu', got '{name}'")
        })?;
    }
    if let Some(url) = &cli.model.model_url {
        settings.model_url = Some(url.clone());
    }
    if let Command::Camera {
        camera,
        fps,
        workers,
        ..
    } = &cli.command
    {
        if let Some(name) = camera {
            settings.camera = parse_camera(name)?;
        }
        if let Some(fps) = fps {
            settings.frame_rate = *fps;
        }
        if let Some(workers) = workers {
            settings.workers = *workers;
        }
    }
    Ok(settings)
}

fn parse_camera(name: &str) -> Result<CameraPosition, Box<dyn std::error::Error>> {
    match name {
        "back" => Ok(CameraPosition::Back),
        "front" => Ok(CameraPosition::Front),
        _ => Err(format!("Camera must be 'back' or 'front', got '{name}'").into()),
    }
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    settings.detector_config().validate()?;
    let fps = settings.frame_rate;
    if !fps.is_finite() || fps < 0.0 || (fps > 0.0 && fps < MIN_CAPTURE_FPS) {
        return Err(format!(
            "Frame rate must be 0 or at least {MIN_CAPTURE_FPS}, got {fps}"
        )
        .into());
    }
    if settings.workers == 0 {
        return Err("Workers must be at least 1".into());
    }
    if let Some(labels) = &cli.model.labels {
        if !labels.exists() {
            return Err(format!("Labels file not found: {}", labels.display()).into());
        }
    }
    match &cli.command {
        Command::Detect {
            input,
            view_width,
            view_height,
            ..
        } => {
            if !input.exists() {
                return Err(format!("Input file not found: {}", input.display()).into());
            }
            if let (Some(w), Some(h)) = (view_width, view_height) {
                check_view(*w, *h)?;
            }
        }
        Command::Camera {
            frames,
            view_width,
            view_height,
            ..
        } => {
            if !frames.is_dir() {
                return Err(format!("Frames directory not found: {}", frames.display()).into());
            }
            check_view(*view_width, *view_height)?;
        }
    }
    Ok(())
}

fn check_view(width: f64, height: f64) -> Result<(), Box<dyn std::error::Error>> {
    if width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(format!("View size must be positive, got {width}x{height}").into())
    }
}

fn build_detector(
    args: &ModelArgs,
    settings: &Settings,
) -> Result<Detector, Box<dyn std::error::Error>> {
    let class_names = match &args.labels {
        Some(path) => load_class_names(path)?,
        None => coco_class_names(),
    };
    let spec = ModelSpec {
        name: args.model.clone(),
        bundle_dir: args.bundle_dir.clone(),
        download_url: settings.model_url.clone(),
        class_names,
        target: settings.execution,
    };

    log::info!("Resolving model: {}", spec.name);
    let (progress, downloading) = progress_reporter();
    let detector = Detector::from_bundle(&spec, settings.detector_config(), Some(progress));
    if downloading.load(Ordering::Relaxed) {
        eprintln!();
    }

    if let Some(reason) = detector.unavailable_reason() {
        log::warn!("Detection disabled: {reason}");
    }
    Ok(detector)
}

/// Progress callback plus a flag telling whether it ever fired, so the
/// progress line is only terminated when one was printed.
fn progress_reporter() -> (ProgressFn, Arc<AtomicBool>) {
    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    let progress: ProgressFn = Box::new(move |downloaded, total| {
        flag.store(true, Ordering::Relaxed);
        download_progress(downloaded, total);
    });
    (progress, fired)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading detection model... {pct}%");
    } else {
        eprint!("\rDownloading detection model... {downloaded} bytes");
    }
}

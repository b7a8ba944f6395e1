//! parkwatch - parking spot occupancy over an image or video
//!
//! This binary:
//! 1. Loads the annotated spot list (fatal if missing)
//! 2. Opens the input (still image, video file, or stub://)
//! 3. Runs the configured vehicle detector on every frame
//! 4. Marks each spot occupied/vacant and counts them
//! 5. Writes annotated frames and logs the running counter
//!
//! Ctrl-C stops the run between frames.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_occupancy::config::DetectorKind;
use parking_occupancy::render::LabelFont;
use parking_occupancy::ui::Ui;
use parking_occupancy::{
    build_detector, FileConfig, FileSource, ImageDirSink, InputKind, LogSink, MultiSink,
    ParkingConfig, PeekedSource, Pipeline, RenderOptions, SpotStore,
};

#[derive(Parser, Debug)]
#[command(name = "parkwatch", author, version, about = "Parking spot occupancy detector")]
struct Args {
    /// Input image, video file, or stub:// source.
    input: Option<String>,
    /// Parking spots JSON file.
    #[arg(long)]
    spots: Option<PathBuf>,
    /// Fraction of a spot a detection must cover to mark it occupied (exclusive).
    #[arg(long)]
    overlap: Option<f64>,
    /// Detections at or below this confidence are ignored.
    #[arg(long)]
    conf: Option<f32>,
    /// Detector backend: stub, replay or tract.
    #[arg(long)]
    detector: Option<String>,
    /// ONNX model for the tract detector.
    #[arg(long)]
    model: Option<PathBuf>,
    /// JSON-lines detection dump for the replay detector.
    #[arg(long)]
    detections: Option<PathBuf>,
    /// Output directory for annotated frames.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Decimate video to this many frames per second (default keeps every frame).
    #[arg(long)]
    fps: Option<u32>,
    /// TrueType font for spot numbers and the counter.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Do not draw spot numbers.
    #[arg(long)]
    no_labels: bool,
    /// Overlay raw detection boxes.
    #[arg(long)]
    show_detections: bool,
    /// Terminal output: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());

    let cfg = resolve_config(&args)?;
    let input = cfg
        .input
        .path
        .clone()
        .ok_or_else(|| anyhow!("no input given (pass a path or set PARKING_INPUT)"))?;

    let spots = {
        let _stage = ui.stage("load parking spots");
        SpotStore::load(&cfg.spots_path)?
    };
    if spots.is_empty() {
        log::warn!("spot file {} lists no spots", cfg.spots_path.display());
    }

    let detector = {
        let _stage = ui.stage("prepare detector");
        build_detector(&cfg.detector)?
    };

    let mut source = FileSource::new(FileConfig {
        path: input.clone(),
        target_fps: cfg.input.target_fps,
        max_frames: cfg.input.max_frames,
    })?;
    source.connect()?;
    let kind = source.kind();

    let first = source
        .next_frame()?
        .ok_or_else(|| anyhow!("could not read a frame from {}", input))?;
    let spots = spots.clamp_to_frame(first.width, first.height);
    log::info!(
        "frame size {}x{}, {} spots ({} degenerate), overlap > {}, confidence > {}",
        first.width,
        first.height,
        spots.len(),
        spots.degenerate_count(),
        cfg.thresholds.overlap,
        cfg.thresholds.confidence
    );

    let options = RenderOptions {
        label_spots: cfg.output.label_spots,
        show_detections: cfg.output.show_detections,
    };
    let mut pipeline = Pipeline::new(spots, cfg.thresholds, detector)?.with_render_options(options);

    let stem = input_stem(&input);
    let mut image_sink =
        ImageDirSink::new(cfg.output.dir.clone(), &stem, kind != InputKind::Image)?;
    if let Some(path) = &cfg.output.font_path {
        image_sink = image_sink.with_font(LabelFont::from_path(path)?);
    }
    let mut sink = if kind == InputKind::Image {
        MultiSink::new().push(LogSink).push(image_sink)
    } else {
        MultiSink::new().push(ui.frame_progress()).push(image_sink)
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let mut frames = PeekedSource::new(first, source);
    let stats = {
        let _stage = ui.stage("process frames");
        pipeline.run(&mut frames, &mut sink, &stop)?
    };

    let source_stats = frames.inner().stats();
    log::info!(
        "done: {} frames read from {}, {} processed, {} skipped{}",
        source_stats.frames_captured,
        source_stats.path,
        stats.frames_processed,
        stats.frames_skipped,
        if stats.interrupted { " (interrupted)" } else { "" }
    );
    if stats.frames_processed == 0 {
        return Err(anyhow!("no frame was processed successfully"));
    }
    if cfg.detector.reports_nothing() {
        log::warn!("stub detector was used: counts below do not reflect the lot");
    }
    println!(
        "Taken: {} / Available: {}",
        stats.last_occupied, stats.last_available
    );
    Ok(())
}

fn resolve_config(args: &Args) -> Result<ParkingConfig> {
    let mut cfg = ParkingConfig::load_unvalidated()?;
    if let Some(input) = &args.input {
        cfg.input.path = Some(input.clone());
    }
    if let Some(spots) = &args.spots {
        cfg.spots_path = spots.clone();
    }
    if let Some(overlap) = args.overlap {
        cfg.thresholds.overlap = overlap;
    }
    if let Some(conf) = args.conf {
        cfg.thresholds.confidence = conf;
    }
    if let Some(detector) = &args.detector {
        cfg.detector.kind = DetectorKind::parse(detector)?;
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
    if let Some(detections) = &args.detections {
        cfg.detector.detections_path = Some(detections.clone());
    }
    if let Some(out) = &args.out {
        cfg.output.dir = out.clone();
    }
    if let Some(max_frames) = args.max_frames {
        cfg.input.max_frames = Some(max_frames);
    }
    if let Some(fps) = args.fps {
        cfg.input.target_fps = fps;
    }
    if args.no_labels {
        cfg.output.label_spots = false;
    }
    if args.show_detections {
        cfg.output.show_detections = true;
    }
    if let Some(font) = &args.font {
        cfg.output.font_path = Some(font.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

fn input_stem(input: &str) -> String {
    let trimmed = input.strip_prefix("stub://").unwrap_or(input);
    Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("frame")
        .to_string()
}

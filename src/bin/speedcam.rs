//! speedcam - annotate frames with object detections and their on-screen speed

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::RgbImage;

use speedcam::config::{Args, Config, DetectorSpec, SourceSpec};
use speedcam::detector::{Detect, DumpingDetector, ReplayDetector};
use speedcam::io::{ImageSequenceSink, ImageSequenceSource};
use speedcam::pipeline::{CancelToken, Pipeline, RunSummary, Sinks};
use speedcam::{Canvas, FrameProcessor};

fn build_detector<F: Canvas + 'static>(config: &Config) -> Result<Box<dyn Detect<F>>> {
    let detector: Box<dyn Detect<F>> = match &config.detector {
        DetectorSpec::Replay(path) => Box::new(ReplayDetector::open(path)?),
        #[cfg(feature = "tract")]
        DetectorSpec::Yolo { model, config } => {
            Box::new(speedcam::detector::YoloDetector::new(model, config.clone())?)
        }
        #[cfg(not(feature = "tract"))]
        DetectorSpec::Yolo { model, .. } => {
            return Err(anyhow!(
                "cannot load {}: built without the `tract` feature",
                model.display()
            ))
        }
    };

    match &config.dump_detections {
        Some(path) => Ok(Box::new(DumpingDetector::create(detector, path)?)),
        None => Ok(detector),
    }
}

fn run_images(config: &Config, cancel: &CancelToken) -> Result<RunSummary> {
    let dir = match &config.source {
        SourceSpec::Path(dir) => dir.clone(),
        SourceSpec::Camera(_) => return Err(anyhow!("image sources must be directories")),
    };

    if config.display {
        log::warn!("preview window needs the `opencv` feature, running headless");
    }

    let detector = build_detector::<RgbImage>(config)?;
    let processor = FrameProcessor::new(config.style.clone(), config.calibration.clone());
    let mut pipeline = Pipeline::new(processor, detector);

    let fps = config.fps;
    let summary = pipeline.run(
        || ImageSequenceSource::open(&dir, fps),
        |info| {
            let mut sinks: Sinks<RgbImage> = Sinks::new();
            if let Some(out) = &config.output {
                sinks.push(ImageSequenceSink::create(out, info)?);
            }
            Ok(sinks)
        },
        cancel,
    )?;

    Ok(summary)
}

#[cfg(feature = "opencv")]
fn run_capture(config: &Config, cancel: &CancelToken) -> Result<RunSummary> {
    use opencv::core::Mat;
    use speedcam::io::{CaptureSource, VideoFileSink, WindowSink};

    let detector = build_detector::<Mat>(config)?;
    let processor = FrameProcessor::new(config.style.clone(), config.calibration.clone());
    let mut pipeline = Pipeline::new(processor, detector);

    let summary = pipeline.run(
        || CaptureSource::open(&config.source),
        |info| {
            let mut sinks: Sinks<Mat> = Sinks::new();
            if let Some(out) = &config.output {
                sinks.push(VideoFileSink::create(out, info)?);
            }
            if config.display {
                sinks.push(WindowSink::open(speedcam::io::capture::WINDOW_NAME)?);
            }
            Ok(sinks)
        },
        cancel,
    )?;

    Ok(summary)
}

#[cfg(not(feature = "opencv"))]
fn run_capture(config: &Config, _cancel: &CancelToken) -> Result<RunSummary> {
    Err(anyhow!(
        "{} needs the `opencv` feature, only image directories are supported",
        config.source
    ))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::try_from(args).context("invalid configuration")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, finishing current frame");
        handler_token.cancel();
    })
    .context("error setting Ctrl-C handler")?;

    log::info!(
        "source {} with style `{}`, {} px per {}",
        config.source,
        config.style.name,
        config.calibration.pixels_per_unit,
        config.calibration.unit
    );

    let summary = match &config.source {
        SourceSpec::Path(path) if path.is_dir() => run_images(&config, &cancel)?,
        _ => run_capture(&config, &cancel)?,
    };

    if let Some(out) = &config.output {
        log::info!("saved output to {}", out.display());
    }
    log::info!(
        "{} frames, {} detections, ended: {:?}",
        summary.frames,
        summary.detections,
        summary.end
    );

    Ok(())
}

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::detector::YoloDetectorConfig;
use crate::error::Error;
use crate::speed::{Calibration, DEFAULT_PIXELS_PER_UNIT, DEFAULT_UNIT};
use crate::style::{StyleKind, StyleProfile};

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Camera(i32),
    Path(PathBuf),
}

impl FromStr for SourceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Config("source must not be empty".into()));
        }

        if s.eq_ignore_ascii_case("webcam") {
            return Ok(SourceSpec::Camera(0));
        }

        let index = s.strip_prefix("camera:").unwrap_or(s);
        match index.parse::<i32>() {
            Ok(idx) if idx >= 0 => Ok(SourceSpec::Camera(idx)),
            Ok(idx) => Err(Error::Config(format!("invalid camera index {}", idx))),
            Err(_) if index.len() != s.len() => {
                Err(Error::Config(format!("invalid camera index `{}`", index)))
            }
            Err(_) => Ok(SourceSpec::Path(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Camera(idx) => write!(f, "camera:{}", idx),
            SourceSpec::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorSpec {
    /// Pre-computed detections file.
    Replay(PathBuf),
    /// ONNX model run with tract.
    Yolo {
        model: PathBuf,
        config: YoloDetectorConfig,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Annotate video frames with detections and their speed")]
pub struct Args {
    /// Frame source: `camera:N`, `webcam`, a video file or a directory of images.
    #[arg(long, env = "SPEEDCAM_SOURCE", default_value = "camera:0")]
    pub source: String,

    /// Save annotated frames: a video file, or a directory for image sources.
    #[arg(long, env = "SPEEDCAM_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Do not open a preview window.
    #[arg(long, env = "SPEEDCAM_HEADLESS")]
    pub headless: bool,

    /// Annotation style, `recorded` by default when saving, `plain` otherwise.
    #[arg(long, value_enum, env = "SPEEDCAM_STYLE")]
    pub style: Option<StyleKind>,

    /// Calibration: pixels per distance unit.
    #[arg(long, env = "SPEEDCAM_PIXELS_PER_UNIT", default_value_t = DEFAULT_PIXELS_PER_UNIT)]
    pub pixels_per_unit: f64,

    /// Distance unit shown in the speed text.
    #[arg(long, env = "SPEEDCAM_UNIT", default_value = DEFAULT_UNIT)]
    pub unit: String,

    /// Frame rate assumed for image directories.
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    /// Replay detections from a file instead of running a model.
    #[arg(long, env = "SPEEDCAM_DETECTIONS", conflicts_with = "model")]
    pub detections: Option<PathBuf>,

    /// YOLOv8 ONNX model (requires the `tract` feature).
    #[arg(long, env = "SPEEDCAM_MODEL")]
    pub model: Option<PathBuf>,

    /// Append every frame's detections to this file in replay format.
    #[arg(long)]
    pub dump_detections: Option<PathBuf>,

    /// Minimum class score for model detections.
    #[arg(long, default_value_t = 0.25)]
    pub confidence: f32,

    /// IoU above which overlapping boxes of one class are suppressed.
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// Square model input size in pixels.
    #[arg(long, default_value_t = 640)]
    pub input_size: u32,

    /// Comma separated class indexes to keep, all when omitted.
    #[arg(long, value_delimiter = ',')]
    pub classes: Vec<i32>,
}

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceSpec,
    pub output: Option<PathBuf>,
    pub display: bool,
    pub style: StyleProfile,
    pub calibration: Calibration,
    pub fps: f64,
    pub detector: DetectorSpec,
    pub dump_detections: Option<PathBuf>,
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let source: SourceSpec = args.source.parse()?;
        let calibration = Calibration::new(args.pixels_per_unit, args.unit)?;

        if !args.fps.is_finite() || args.fps <= 0.0 {
            return Err(Error::Config(format!("fps must be positive, got {}", args.fps)));
        }

        if !(0.0..=1.0).contains(&args.confidence) || !(0.0..=1.0).contains(&args.iou) {
            return Err(Error::Config(
                "confidence and iou thresholds must be within [0, 1]".into(),
            ));
        }

        if args.input_size == 0 {
            return Err(Error::Config("model input size must be positive".into()));
        }

        let detector = match (args.detections, args.model) {
            (Some(path), None) => DetectorSpec::Replay(path),
            (None, Some(model)) => {
                let mut config = YoloDetectorConfig::new(args.confidence, args.classes);
                config.iou_threshold = args.iou;
                config.input_size = (args.input_size, args.input_size);
                DetectorSpec::Yolo { model, config }
            }
            (None, None) => {
                return Err(Error::Config(
                    "a detector is required: pass --model or --detections".into(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "--model and --detections are mutually exclusive".into(),
                ))
            }
        };

        let style = match args.style {
            Some(kind) => kind.profile(),
            None if args.output.is_some() => StyleProfile::recorded(),
            None => StyleProfile::plain(),
        };

        Ok(Self {
            source,
            output: args.output,
            display: !args.headless,
            style,
            calibration,
            fps: args.fps,
            detector,
            dump_detections: args.dump_detections,
        })
    }
}

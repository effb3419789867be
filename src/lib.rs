pub mod bbox;
pub mod canvas;
pub mod clock;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod processor;
pub mod render;
pub mod speed;
pub mod style;
pub mod track;

mod font;

pub use canvas::{Canvas, Rect};
pub use detection::{Centroid, Detection};
pub use detector::Detect;
pub use error::Error;
pub use pipeline::{CancelToken, DriverState, FrameSink, FrameSource, Pipeline, RunSummary};
pub use processor::{FrameProcessor, FrameReport};
pub use speed::{estimate_speed, Calibration};
pub use style::{Color, StyleKind, StyleProfile};
pub use track::TrackState;

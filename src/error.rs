use thiserror::Error;

use crate::pipeline::DriverState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to open source: {0}")]
    SourceUnavailable(String),

    #[error("Source reported invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Pipeline cannot run from state {0:?}")]
    InvalidState(DriverState),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Detections file error at line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Inference Error: {0}")]
    Inference(String),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}

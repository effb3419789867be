pub mod names;
pub mod postprocess;
pub mod replay;
#[cfg(feature = "tract")]
pub mod yolo;

pub use postprocess::YoloDetectorConfig;
pub use replay::{DumpingDetector, ReplayDetector};
#[cfg(feature = "tract")]
pub use yolo::YoloDetector;

use crate::detection::Detection;
use crate::error::Error;

/// Object detector adapter.
///
/// Returns the boxes found on `frame` in model order. An empty list is the
/// normal answer for a frame without objects.
pub trait Detect<F> {
    fn detect(&mut self, frame: &F) -> Result<Vec<Detection>, Error>;
}

impl<F, D: Detect<F> + ?Sized> Detect<F> for Box<D> {
    #[inline]
    fn detect(&mut self, frame: &F) -> Result<Vec<Detection>, Error> {
        (**self).detect(frame)
    }
}

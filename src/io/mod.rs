//! Frame sources and sinks.
//!
//! Image directories are always available. Cameras, video files and the preview
//! window need the `opencv` feature.

#[cfg(feature = "opencv")]
pub mod capture;
pub mod images;

#[cfg(feature = "opencv")]
pub use capture::{CaptureSource, VideoFileSink, WindowSink};
pub use images::{ImageSequenceSink, ImageSequenceSource};

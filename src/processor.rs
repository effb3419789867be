use crate::canvas::Canvas;
use crate::clock::{Clock, SystemClock};
use crate::detector::Detect;
use crate::error::Error;
use crate::render::render;
use crate::speed::{estimate_speed, Calibration};
use crate::style::StyleProfile;
use crate::track::TrackState;

/// What was drawn on one frame, in detector order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub detections: usize,
    pub speeds: Vec<Option<f64>>,
}

/// Detect, estimate and annotate, one frame at a time.
///
/// Owns the single track sample. Every rendered detection overwrites it, so the
/// speed of a detection is measured against the detection rendered before it,
/// whether that one came from the same frame or the previous one.
pub struct FrameProcessor<K: Clock = SystemClock> {
    track: TrackState,
    style: StyleProfile,
    calibration: Calibration,
    clock: K,
}

impl FrameProcessor<SystemClock> {
    pub fn new(style: StyleProfile, calibration: Calibration) -> Self {
        Self::with_clock(style, calibration, SystemClock)
    }
}

impl<K: Clock> FrameProcessor<K> {
    pub fn with_clock(style: StyleProfile, calibration: Calibration, clock: K) -> Self {
        Self {
            track: TrackState::new(),
            style,
            calibration,
            clock,
        }
    }

    #[inline]
    pub fn track(&self) -> &TrackState {
        &self.track
    }

    #[inline]
    pub fn style(&self) -> &StyleProfile {
        &self.style
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn reset(&mut self) {
        self.track.reset();
    }

    pub fn process<F: Canvas>(
        &mut self,
        frame: &mut F,
        detector: &mut dyn Detect<F>,
    ) -> Result<FrameReport, Error> {
        let detections = match detector.detect(frame) {
            Ok(dets) => dets,
            Err(err) => {
                log::warn!("detector failed, frame left unannotated: {}", err);
                Vec::new()
            }
        };

        let mut report = FrameReport {
            detections: detections.len(),
            speeds: Vec::with_capacity(detections.len()),
        };

        for det in &detections {
            let point = det.centroid();
            let now = self.clock.now();
            let speed = estimate_speed(point, now, &self.track, &self.calibration);

            render(frame, det, speed, &self.style, &self.calibration)?;

            self.track.record(point, now);
            report.speeds.push(speed);
        }

        log::debug!(
            "frame annotated: {} detections, {} with speed",
            report.detections,
            report.speeds.iter().filter(|s| s.is_some()).count()
        );

        Ok(report)
    }
}

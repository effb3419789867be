use std::time::Instant;

use crate::detection::Centroid;

/// Last observed point together with the instant it was observed.
///
/// A single `TrackState` is shared by every detection the processor sees, so with
/// several objects in a frame each detection is measured against the one rendered
/// right before it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackState {
    last: Option<(Centroid, Instant)>,
}

impl TrackState {
    #[inline]
    pub fn new() -> Self {
        Self { last: None }
    }

    #[inline]
    pub fn last_point(&self) -> Option<Centroid> {
        self.last.map(|(point, _)| point)
    }

    #[inline]
    pub fn last_timestamp(&self) -> Option<Instant> {
        self.last.map(|(_, ts)| ts)
    }

    #[inline]
    pub fn last_sample(&self) -> Option<(Centroid, Instant)> {
        self.last
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }

    /// Overwrites the previous sample.
    #[inline]
    pub fn record(&mut self, point: Centroid, ts: Instant) {
        self.last = Some((point, ts));
    }

    #[inline]
    pub fn reset(&mut self) {
        self.last = None;
    }
}

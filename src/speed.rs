use std::time::Instant;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::detection::Centroid;
use crate::error::Error;
use crate::track::TrackState;

pub const DEFAULT_PIXELS_PER_UNIT: f64 = 5.0;
pub const DEFAULT_UNIT: &str = "cm";

/// Fixed ratio converting on-screen pixel distance into physical distance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Calibration {
    pub pixels_per_unit: f64,
    pub unit: String,
}

impl Calibration {
    pub fn new<S: Into<String>>(pixels_per_unit: f64, unit: S) -> Result<Self, Error> {
        let unit = unit.into();

        if !pixels_per_unit.is_finite() || pixels_per_unit <= 0.0 {
            return Err(Error::Config(format!(
                "pixels per unit must be a positive number, got {}",
                pixels_per_unit
            )));
        }

        if unit.trim().is_empty() {
            return Err(Error::Config("distance unit must not be empty".into()));
        }

        Ok(Self {
            pixels_per_unit,
            unit,
        })
    }

    #[inline]
    pub fn to_units(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_unit
    }

    /// Speed text as drawn on frames, e.g. `Speed: 5.00 cm/s`.
    pub fn format_speed(&self, speed: f64) -> String {
        format!("Speed: {:.2} {}/s", speed, self.unit)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            unit: DEFAULT_UNIT.to_string(),
        }
    }
}

#[inline]
pub fn pixel_distance(a: Centroid, b: Centroid) -> f64 {
    na::distance(
        &na::Point2::new(a.cx as f64, a.cy as f64),
        &na::Point2::new(b.cx as f64, b.cy as f64),
    )
}

/// Speed in calibrated units per second between the track's last sample and `point`.
///
/// Returns `None` when there is no previous sample or when `now` is not strictly
/// after the previous timestamp.
pub fn estimate_speed(
    point: Centroid,
    now: Instant,
    track: &TrackState,
    calibration: &Calibration,
) -> Option<f64> {
    let (last_point, last_ts) = track.last_sample()?;

    let distance = calibration.to_units(pixel_distance(point, last_point));
    let elapsed = now.checked_duration_since(last_ts)?.as_secs_f64();

    if elapsed <= 0.0 {
        return None;
    }

    Some(distance / elapsed)
}

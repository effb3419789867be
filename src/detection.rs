use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// Contains pixel corners (x1,y1)-(x2,y2) of bbox together with the model label
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub label: String,
    #[serde(rename = "class")]
    pub class_id: i32,
}

/// Midpoint of a detection box, in pixels
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Centroid {
    pub cx: i32,
    pub cy: i32,
}

impl Centroid {
    #[inline]
    pub fn new(cx: i32, cy: i32) -> Self {
        Self { cx, cy }
    }
}

impl Detection {
    pub fn new<S: Into<String>>(x1: i32, y1: i32, x2: i32, y2: i32, label: S, class_id: i32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            label: label.into(),
            class_id,
        }
    }

    /// Truncates a floating point box to integer pixel corners.
    pub fn from_bbox<S: Into<String>>(bbox: &BBox<Ltrb>, label: S, class_id: i32) -> Self {
        Self::new(
            bbox.left() as i32,
            bbox.top() as i32,
            bbox.right() as i32,
            bbox.bottom() as i32,
            label,
            class_id,
        )
    }

    #[inline]
    pub fn bbox(&self) -> BBox<Ltrb> {
        BBox::ltrb(self.x1 as f32, self.y1 as f32, self.x2 as f32, self.y2 as f32)
    }

    #[inline(always)]
    pub fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    #[inline(always)]
    pub fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Floor midpoint of the box.
    #[inline]
    pub fn centroid(&self) -> Centroid {
        Centroid {
            cx: midpoint(self.x1, self.x2),
            cy: midpoint(self.y1, self.y2),
        }
    }
}

/// The midpoint of two `i32` always fits back into `i32`.
#[inline]
fn midpoint(a: i32, b: i32) -> i32 {
    (a as i64 + b as i64).div_euclid(2) as i32
}

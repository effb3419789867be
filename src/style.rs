use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Rendering parameters for one presentation variant.
///
/// Offsets are measured upwards from the box's top edge to the text baseline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StyleProfile {
    pub name: String,
    pub box_color: Color,
    pub box_thickness: i32,
    pub label_offset: i32,
    pub label_scale: f64,
    pub label_color: Color,
    pub label_thickness: i32,
    pub speed_offset: i32,
    pub speed_color: Color,
    /// `0.0` keeps the box outline-only.
    pub fill_alpha: f32,
}

impl StyleProfile {
    /// Thin green boxes, used for live preview.
    pub fn plain() -> Self {
        Self {
            name: "plain".into(),
            box_color: Color::rgb(0, 255, 0),
            box_thickness: 2,
            label_offset: 10,
            label_scale: 0.6,
            label_color: Color::rgb(0, 255, 0),
            label_thickness: 2,
            speed_offset: 30,
            speed_color: Color::rgb(255, 0, 0),
            fill_alpha: 0.0,
        }
    }

    /// Thick red boxes over a translucent red highlight.
    pub fn highlight() -> Self {
        Self {
            name: "highlight".into(),
            box_color: Color::rgb(255, 0, 0),
            box_thickness: 4,
            label_offset: 10,
            label_scale: 1.0,
            label_color: Color::rgb(0, 255, 0),
            label_thickness: 3,
            speed_offset: 40,
            speed_color: Color::rgb(0, 255, 255),
            fill_alpha: 0.4,
        }
    }

    /// Dark green boxes with larger text, used when frames are saved to a file.
    pub fn recorded() -> Self {
        Self {
            name: "recorded".into(),
            box_color: Color::rgb(0, 100, 0),
            box_thickness: 4,
            label_offset: 20,
            label_scale: 1.0,
            label_color: Color::rgb(0, 100, 0),
            label_thickness: 3,
            speed_offset: 50,
            speed_color: Color::rgb(150, 0, 0),
            fill_alpha: 0.0,
        }
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.fill_alpha > 0.0
    }
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self::plain()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StyleKind {
    #[default]
    Plain,
    Highlight,
    Recorded,
}

impl StyleKind {
    pub fn profile(self) -> StyleProfile {
        match self {
            StyleKind::Plain => StyleProfile::plain(),
            StyleKind::Highlight => StyleProfile::highlight(),
            StyleKind::Recorded => StyleProfile::recorded(),
        }
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StyleKind::Plain => "plain",
            StyleKind::Highlight => "highlight",
            StyleKind::Recorded => "recorded",
        };

        f.write_str(name)
    }
}

impl FromStr for StyleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(StyleKind::Plain),
            "highlight" => Ok(StyleKind::Highlight),
            "recorded" => Ok(StyleKind::Recorded),
            other => Err(Error::Config(format!("unknown style profile `{}`", other))),
        }
    }
}

use image::{Rgb, RgbImage};

use crate::error::Error;
use crate::font;
use crate::style::Color;

/// Inclusive pixel rectangle, (x1,y1) top left and (x2,y2) bottom right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    #[inline]
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Intersection with `[0, width) x [0, height)`, `None` when nothing is left.
    pub fn clip(&self, width: u32, height: u32) -> Option<Rect> {
        let x1 = self.x1.max(0);
        let y1 = self.y1.max(0);
        let x2 = self.x2.min(width as i32 - 1);
        let y2 = self.y2.min(height as i32 - 1);

        if x1 > x2 || y1 > y2 {
            None
        } else {
            Some(Rect::new(x1, y1, x2, y2))
        }
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }
}

/// A frame buffer annotations can be drawn on in place.
pub trait Canvas {
    /// (width, height) in pixels.
    fn size(&self) -> (u32, u32);

    /// Rectangle outline centered on the edges of `rect`. A non-positive
    /// thickness fills the rectangle.
    fn draw_rect(&mut self, rect: Rect, color: Color, thickness: i32) -> Result<(), Error>;

    /// `alpha * color + (1 - alpha) * pixel` over every pixel of `rect`.
    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: f32) -> Result<(), Error>;

    /// Draws `text` with `origin` at the bottom left corner of the first glyph.
    fn draw_text(
        &mut self,
        text: &str,
        origin: (i32, i32),
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error>;

    /// Packed RGB copy of the pixels, row major.
    fn to_rgb(&self) -> Result<Vec<u8>, Error>;
}

fn fill(image: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    if let Some(r) = rect.clip(image.width(), image.height()) {
        for y in r.y1..=r.y2 {
            for x in r.x1..=r.x2 {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

#[inline]
fn blend_channel(fill: u8, orig: u8, alpha: f32) -> u8 {
    (alpha * fill as f32 + (1.0 - alpha) * orig as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

impl Canvas for RgbImage {
    #[inline]
    fn size(&self) -> (u32, u32) {
        self.dimensions()
    }

    fn draw_rect(&mut self, rect: Rect, color: Color, thickness: i32) -> Result<(), Error> {
        let color = Rgb(color.to_array());

        if thickness <= 0 {
            fill(self, rect, color);
            return Ok(());
        }

        let before = thickness / 2;
        let after = thickness - 1 - before;
        let outer = Rect::new(
            rect.x1.saturating_sub(before),
            rect.y1.saturating_sub(before),
            rect.x2.saturating_add(after),
            rect.y2.saturating_add(after),
        );

        // top, bottom, left, right bands
        fill(self, Rect::new(outer.x1, outer.y1, outer.x2, rect.y1.saturating_add(after)), color);
        fill(self, Rect::new(outer.x1, rect.y2.saturating_sub(before), outer.x2, outer.y2), color);
        fill(self, Rect::new(outer.x1, outer.y1, rect.x1.saturating_add(after), outer.y2), color);
        fill(self, Rect::new(rect.x2.saturating_sub(before), outer.y1, outer.x2, outer.y2), color);

        Ok(())
    }

    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: f32) -> Result<(), Error> {
        let alpha = alpha.clamp(0.0, 1.0);
        let fill = color.to_array();

        if let Some(r) = rect.clip(self.width(), self.height()) {
            for y in r.y1..=r.y2 {
                for x in r.x1..=r.x2 {
                    let px = self.get_pixel_mut(x as u32, y as u32);
                    for c in 0..3 {
                        px.0[c] = blend_channel(fill[c], px.0[c], alpha);
                    }
                }
            }
        }

        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        origin: (i32, i32),
        scale: f64,
        color: Color,
        thickness: i32,
    ) -> Result<(), Error> {
        let color = Rgb(color.to_array());
        let cell = font::cell_size(scale);
        let bold = if thickness > 2 { 1 } else { 0 };
        let top = origin.1.saturating_sub(font::GLYPH_HEIGHT * cell);
        let mut pen = origin.0;

        for ch in text.chars() {
            if let Some(rows) = font::glyph(ch) {
                for (row, pattern) in rows.iter().enumerate() {
                    for col in 0..font::GLYPH_WIDTH {
                        if (pattern >> (font::GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                            let x = pen.saturating_add(col * cell);
                            let y = top.saturating_add(row as i32 * cell);
                            let x2 = x.saturating_add(cell - 1 + bold);
                            fill(self, Rect::new(x, y, x2, y.saturating_add(cell - 1)), color);
                        }
                    }
                }
            }

            pen = pen.saturating_add(font::GLYPH_ADVANCE * cell);
        }

        Ok(())
    }

    fn to_rgb(&self) -> Result<Vec<u8>, Error> {
        Ok(self.as_raw().clone())
    }
}

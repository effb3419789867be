use crate::canvas::{Canvas, Rect};
use crate::detection::Detection;
use crate::error::Error;
use crate::speed::Calibration;
use crate::style::StyleProfile;

/// Draws one detection: optional translucent fill, outline, label and speed line.
///
/// Knows nothing about tracking or time, the caller decides which speed to show.
pub fn render<C: Canvas + ?Sized>(
    canvas: &mut C,
    det: &Detection,
    speed: Option<f64>,
    style: &StyleProfile,
    calibration: &Calibration,
) -> Result<(), Error> {
    let rect = Rect::new(det.x1, det.y1, det.x2, det.y2);

    if style.is_filled() {
        canvas.blend_rect(rect, style.box_color, style.fill_alpha)?;
    }

    canvas.draw_rect(rect, style.box_color, style.box_thickness)?;

    canvas.draw_text(
        &det.label,
        (det.x1, det.y1.saturating_sub(style.label_offset)),
        style.label_scale,
        style.label_color,
        style.label_thickness,
    )?;

    if let Some(speed) = speed {
        canvas.draw_text(
            &calibration.format_speed(speed),
            (det.x1, det.y1.saturating_sub(style.speed_offset)),
            style.label_scale,
            style.speed_color,
            style.label_thickness,
        )?;
    }

    Ok(())
}

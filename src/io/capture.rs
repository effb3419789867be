use std::path::Path;

use opencv::{
    core::{self, Mat},
    highgui, imgproc,
    prelude::*,
    videoio,
};

use crate::canvas::{Canvas, Rect};
use crate::config::SourceSpec;
use crate::error::Error;
use crate::pipeline::{FrameSink, FrameSource, StreamInfo};
use crate::style::Color;

pub const WINDOW_NAME: &str = "Object Speed Detection";
pub const ESC_KEY: i32 = 27;

const DEFAULT_FPS: f64 = 30.0;

#[inline]
fn scalar(color: Color) -> core::Scalar {
    core::Scalar::new(color.b as f64, color.g as f64, color.r as f64, 0.0)
}

/// BGR frames as delivered by `VideoCapture`.
impl Canvas for Mat {
    fn size(&self) -> (u32, u32) {
        (self.cols().max(0) as u32, self.rows().max(0) as u32)
    }

    fn draw_rect(&mut self, rect: Rect, color: Color, thickness: i32) -> Result<(), Error> {
        let thickness = if thickness <= 0 {
            imgproc::FILLED
        } else {
            thickness
        };

        imgproc::rectangle_points(
            self,
            core::Point::new(rect.x1, rect.y1),
            core::Point::new(rect.x2, rect.y2),
            scalar(color),
            thickness,
            imgproc::LINE_8,
            0,
        )?;

        Ok(())
    }

    fn blend_rect(&mut self, rect: Rect, color: Color, alpha: f32) -> Result<(), Error> {
        let (width, height) = Canvas::size(self);
        let r = match rect.clip(width, height) {
            Some(r) => r,
            None => return Ok(()),
        };

        let alpha = alpha.clamp(0.0, 1.0) as f64;
        let mut roi = Mat::roi(self, core::Rect::new(r.x1, r.y1, r.x2 - r.x1 + 1, r.y2 - r.y1 + 1))?;
        let fill = Mat::new_rows_cols_with_default(roi.rows(), roi.cols(), roi.typ()?, scalar(color))?;

        let mut blended = Mat::default();
        core::add_weighted(&fill, alpha, &roi, 1.0 - alpha, 0.0, &mut blended, -1)?;
        blended.copy_to(&mut roi)?;

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
        imgproc::put_text(
            self,
            text,
            core::Point::new(origin.0, origin.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            scale,
            scalar(color),
            thickness,
            imgproc::LINE_AA,
            false,
        )?;

        Ok(())
    }

    fn to_rgb(&self) -> Result<Vec<u8>, Error> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(self, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        Ok(rgb.data_bytes()?.to_vec())
    }
}

/// Camera or video file opened through `VideoCapture`.
pub struct CaptureSource {
    cam: videoio::VideoCapture,
    info: StreamInfo,
}

impl CaptureSource {
    pub fn open(spec: &SourceSpec) -> Result<Self, Error> {
        let cam = match spec {
            SourceSpec::Camera(index) => videoio::VideoCapture::new(*index, videoio::CAP_ANY)?,
            SourceSpec::Path(path) => {
                let name = path.to_string_lossy();
                videoio::VideoCapture::from_file(&name, videoio::CAP_ANY)?
            }
        };

        if !videoio::VideoCapture::is_opened(&cam)? {
            return Err(Error::SourceUnavailable(spec.to_string()));
        }

        let width = cam.get(videoio::CAP_PROP_FRAME_WIDTH)?.max(0.0) as u32;
        let height = cam.get(videoio::CAP_PROP_FRAME_HEIGHT)?.max(0.0) as u32;
        let fps = cam.get(videoio::CAP_PROP_FPS)?;

        log::info!(
            "video properties for {}: width={} height={} fps={}",
            spec,
            width,
            height,
            fps
        );

        Ok(Self {
            cam,
            info: StreamInfo { width, height, fps },
        })
    }
}

impl FrameSource for CaptureSource {
    type Frame = Mat;

    fn info(&self) -> StreamInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Mat>, Error> {
        let mut frame = Mat::default();
        if !self.cam.read(&mut frame)? {
            return Ok(None);
        }

        if frame.rows() == 0 || frame.cols() == 0 {
            return Ok(None);
        }

        Ok(Some(frame))
    }

    fn release(&mut self) {
        if let Err(err) = self.cam.release() {
            log::warn!("failed to release capture: {}", err);
        }
    }
}

/// `mp4v` encoded output with the source's size and frame rate.
pub struct VideoFileSink {
    writer: Option<videoio::VideoWriter>,
    size: (i32, i32),
}

impl VideoFileSink {
    pub fn create<P: AsRef<Path>>(path: P, info: &StreamInfo) -> Result<Self, Error> {
        info.ensure_dimensions()?;

        let path = path.as_ref();
        let fps = if info.fps > 0.0 { info.fps } else { DEFAULT_FPS };
        let size = (info.width as i32, info.height as i32);

        let writer = videoio::VideoWriter::new(
            &path.to_string_lossy(),
            videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
            fps,
            core::Size::new(size.0, size.1),
            true,
        )?;

        if !writer.is_opened()? {
            return Err(Error::SourceUnavailable(format!(
                "cannot create video file {}",
                path.display()
            )));
        }

        log::info!("saving output to {} at {:.2} fps", path.display(), fps);

        Ok(Self {
            writer: Some(writer),
            size,
        })
    }
}

impl FrameSink<Mat> for VideoFileSink {
    fn write(&mut self, frame: &Mat) -> Result<(), Error> {
        if (frame.cols(), frame.rows()) != self.size {
            return Err(Error::InvalidDimensions {
                width: frame.cols().max(0) as u32,
                height: frame.rows().max(0) as u32,
            });
        }

        if let Some(writer) = self.writer.as_mut() {
            writer.write(frame)?;
        }

        Ok(())
    }

    fn release(&mut self) -> Result<(), Error> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
        }

        Ok(())
    }
}

/// `highgui` preview window, ESC requests a stop.
pub struct WindowSink {
    name: String,
    open: bool,
}

impl WindowSink {
    pub fn open(name: &str) -> Result<Self, Error> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;

        Ok(Self {
            name: name.to_string(),
            open: true,
        })
    }
}

impl FrameSink<Mat> for WindowSink {
    fn write(&mut self, frame: &Mat) -> Result<(), Error> {
        highgui::imshow(&self.name, frame)?;
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<bool, Error> {
        let key = highgui::wait_key(1)?;
        Ok(key & 0xFF == ESC_KEY)
    }

    fn release(&mut self) -> Result<(), Error> {
        if self.open {
            self.open = false;
            highgui::destroy_all_windows()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn outline_matches_image_canvas() {
        let rect = Rect::new(5, 6, 30, 25);
        let green = Color::rgb(0, 255, 0);

        let mut mat =
            Mat::new_rows_cols_with_default(40, 40, core::CV_8UC3, core::Scalar::all(100.0))
                .unwrap();
        mat.draw_rect(rect, green, 1).unwrap();

        let mut img = RgbImage::from_pixel(40, 40, Rgb([100, 100, 100]));
        img.draw_rect(rect, green, 1).unwrap();

        // both include the bottom right corner
        assert_eq!(mat.to_rgb().unwrap(), img.to_rgb().unwrap());
    }
}

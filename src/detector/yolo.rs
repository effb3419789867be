use std::path::Path;

use image::{imageops, RgbImage};
use tract_onnx::prelude::*;

use crate::canvas::Canvas;
use crate::detection::Detection;
use crate::error::Error;

use super::postprocess::{decode_predictions, YoloDetectorConfig};
use super::Detect;

fn inference_error(err: TractError) -> Error {
    Error::Inference(format!("{:#}", err))
}

/// YOLOv8 ONNX model run on the CPU with tract.
pub struct YoloDetector {
    model: TypedRunnableModel<TypedModel>,
    config: YoloDetectorConfig,
}

impl YoloDetector {
    pub fn new<P: AsRef<Path>>(model_src: P, config: YoloDetectorConfig) -> Result<Self, Error> {
        let model_src = model_src.as_ref();
        let (width, height) = config.input_size;

        let model = tract_onnx::onnx()
            .model_for_path(model_src)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    f32::fact([1, 3, height as usize, width as usize]).into(),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(inference_error)?;

        log::info!(
            "loaded detector model {} ({}x{} input)",
            model_src.display(),
            width,
            height
        );

        Ok(Self { model, config })
    }

    #[inline]
    pub fn config(&self) -> &YoloDetectorConfig {
        &self.config
    }

    fn build_input(&self, pixels: Vec<u8>, fw: u32, fh: u32) -> Result<Tensor, Error> {
        let (in_w, in_h) = self.config.input_size;
        let image = RgbImage::from_raw(fw, fh, pixels).ok_or_else(|| {
            Error::Inference(format!("frame buffer does not match {}x{} RGB", fw, fh))
        })?;
        let resized = imageops::resize(&image, in_w, in_h, imageops::FilterType::Triangle);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, in_h as usize, in_w as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32).0[channel] as f32 / 255.0,
        );

        Ok(input.into_tensor())
    }
}

impl<F: Canvas> Detect<F> for YoloDetector {
    fn detect(&mut self, frame: &F) -> Result<Vec<Detection>, Error> {
        let (fw, fh) = frame.size();
        let input = self.build_input(frame.to_rgb()?, fw, fh)?;

        let outputs = self.model.run(tvec!(input.into())).map_err(inference_error)?;
        let output = outputs
            .first()
            .ok_or_else(|| Error::Inference("model produced no outputs".into()))?;
        let view = output.to_array_view::<f32>().map_err(inference_error)?;

        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(Error::Inference(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }

        let (channels, count) = (shape[1], shape[2]);
        let preds: Vec<f32> = view.iter().copied().collect();

        Ok(decode_predictions(&preds, channels, count, (fw, fh), &self.config))
    }
}

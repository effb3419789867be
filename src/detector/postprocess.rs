use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;

use super::names;

#[derive(Debug, Clone, PartialEq)]
pub struct YoloDetectorConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Keep only these class indexes, all classes when empty.
    pub classes: Vec<i32>,
    /// Model input (width, height).
    pub input_size: (u32, u32),
}

impl YoloDetectorConfig {
    pub fn new(confidence_threshold: f32, classes: Vec<i32>) -> Self {
        Self {
            confidence_threshold,
            iou_threshold: 0.45,
            classes,
            input_size: (640, 640),
        }
    }
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self::new(0.25, Vec::new())
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    bbox: BBox<Ltrb>,
    confidence: f32,
    class: i32,
}

/// Decodes a YOLOv8 style output laid out as `channels x count`, where the first
/// four channels are center-x, center-y, width, height in model input pixels and
/// the rest are per class scores.
///
/// Boxes are mapped back onto a `frame_size` frame, filtered by confidence and
/// class, and suppressed per class.
pub fn decode_predictions(
    preds: &[f32],
    channels: usize,
    count: usize,
    frame_size: (u32, u32),
    config: &YoloDetectorConfig,
) -> Vec<Detection> {
    if channels <= 4 || preds.len() < channels * count {
        return Vec::new();
    }

    let nclasses = channels - 4;
    let (in_w, in_h) = config.input_size;
    let (frame_width, frame_height) = (frame_size.0 as f32, frame_size.1 as f32);
    let sx = frame_width / in_w as f32;
    let sy = frame_height / in_h as f32;
    let at = |channel: usize, index: usize| preds[channel * count + index];

    // The bounding boxes grouped by class index.
    let mut bboxes: Vec<Vec<Candidate>> = (0..nclasses).map(|_| vec![]).collect();

    for index in 0..count {
        let mut class_index = -1;
        let mut confidence = 0.0;

        for class in 0..nclasses {
            let val = at(4 + class, index);
            if val > confidence {
                class_index = class as i32;
                confidence = val;
            }
        }

        if class_index < 0 || confidence <= config.confidence_threshold {
            continue;
        }

        if !config.classes.is_empty() && !config.classes.contains(&class_index) {
            continue;
        }

        let bbox = BBox::xywh(
            at(0, index) * sx,
            at(1, index) * sy,
            at(2, index) * sx,
            at(3, index) * sy,
        )
        .as_ltrb()
        .clamp(frame_width, frame_height);

        if bbox.area() <= 0.0 {
            continue;
        }

        bboxes[class_index as usize].push(Candidate {
            bbox,
            confidence,
            class: class_index,
        });
    }

    let mut results = Vec::new();
    for mut dets in bboxes.into_iter() {
        if dets.is_empty() {
            continue;
        }

        let keep = non_maximum_suppression(&mut dets, config.iou_threshold);
        results.extend(keep.into_iter().map(|idx| {
            let c = &dets[idx];
            Detection::from_bbox(&c.bbox, names::label_for(c.class), c.class)
        }));
    }

    results
}

/// Sorts `dets` by confidence and returns the indexes that survive suppression.
fn non_maximum_suppression(dets: &mut [Candidate], iou_threshold: f32) -> Vec<usize> {
    dets.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut suppressed = vec![false; dets.len()];
    let mut keep = Vec::new();

    for idx in 0..dets.len() {
        if suppressed[idx] {
            continue;
        }

        keep.push(idx);
        for other in idx + 1..dets.len() {
            if !suppressed[other] && dets[idx].bbox.iou(&dets[other].bbox) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a `channels x count` buffer from per prediction rows.
    fn layout(rows: &[Vec<f32>]) -> (Vec<f32>, usize, usize) {
        let channels = rows[0].len();
        let count = rows.len();
        let mut out = vec![0.0; channels * count];
        for (i, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                out[c * count + i] = *v;
            }
        }
        (out, channels, count)
    }

    fn config() -> YoloDetectorConfig {
        let mut config = YoloDetectorConfig::new(0.5, vec![]);
        config.input_size = (100, 100);
        config
    }

    #[test]
    fn scales_boxes_to_frame() {
        let (preds, channels, count) = layout(&[vec![50.0, 50.0, 20.0, 10.0, 0.1, 0.9, 0.0]]);
        let dets = decode_predictions(&preds, channels, count, (200, 100), &config());

        assert_eq!(dets, vec![Detection::new(80, 45, 120, 55, "bicycle", 1)]);
    }

    #[test]
    fn drops_low_confidence_and_filtered_classes() {
        let (preds, channels, count) = layout(&[
            vec![50.0, 50.0, 20.0, 20.0, 0.3, 0.2, 0.0],
            vec![20.0, 20.0, 10.0, 10.0, 0.0, 0.0, 0.95],
            vec![70.0, 70.0, 10.0, 10.0, 0.8, 0.0, 0.0],
        ]);

        let mut config = config();
        config.classes = vec![0, 1];
        let dets = decode_predictions(&preds, channels, count, (100, 100), &config);

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "person");
        assert_eq!(dets[0].class_id, 0);
    }

    #[test]
    fn suppresses_overlapping_boxes_of_same_class() {
        let (preds, channels, count) = layout(&[
            vec![50.0, 50.0, 20.0, 20.0, 0.0, 0.0, 0.7],
            vec![51.0, 50.0, 20.0, 20.0, 0.0, 0.0, 0.9],
            vec![10.0, 10.0, 8.0, 8.0, 0.0, 0.0, 0.8],
            vec![51.0, 50.0, 20.0, 20.0, 0.6, 0.0, 0.0],
        ]);

        let dets = decode_predictions(&preds, channels, count, (100, 100), &config());

        let cars: Vec<_> = dets.iter().filter(|d| d.class_id == 2).collect();
        assert_eq!(cars.len(), 2);
        assert_eq!(cars[0].x1, 41);
        assert_eq!(dets.iter().filter(|d| d.class_id == 0).count(), 1);
    }

    #[test]
    fn malformed_output_yields_nothing() {
        let cfg = config();
        assert!(decode_predictions(&[0.0; 4], 4, 1, (10, 10), &cfg).is_empty());
        assert!(decode_predictions(&[0.0; 5], 6, 1, (10, 10), &cfg).is_empty());
    }
}

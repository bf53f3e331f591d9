/// YOLO face detector for still images using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing.
/// Returned boxes are in source-image pixel coordinates.
use std::path::Path;

use image::RgbImage;

use super::session::{inference_error, open_session};
use super::session_pool::SessionPool;
use crate::recognition::domain::face_recognizer::RecognizerError;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Gray fill for letterbox padding (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Axis-aligned face box `[x1, y1, x2, y2]` with its detection score.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

impl FaceBox {
    fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

pub struct YoloFaceDetector {
    sessions: SessionPool<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl YoloFaceDetector {
    /// Load a YOLO ONNX model into `sessions` independent sessions.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        confidence: f64,
        sessions: usize,
        intra_threads: usize,
    ) -> Result<Self, RecognizerError> {
        let sessions = SessionPool::open(sessions, || open_session(model_path, intra_threads))?;

        let session = sessions.checkout().map_err(inference_error)?;
        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);
        drop(session);

        Ok(Self {
            sessions,
            confidence,
            input_size,
        })
    }

    /// Detect faces, ordered left to right so face indices are stable.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<FaceBox>, RecognizerError> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(image, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference_error)?;
        let mut session = self.sessions.checkout().map_err(inference_error)?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(RecognizerError::Inference(
                "YOLO model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| RecognizerError::Inference("Cannot get tensor slice".into()))?;

        let mut raw = parse_detections(data, &shape, self.confidence)?;
        for det in &mut raw {
            unletterbox(det, scale, pad_x, pad_y);
        }

        let mut kept = nms(&mut raw, NMS_IOU_THRESH);
        kept.sort_by(|a, b| a.x1.total_cmp(&b.x1).then(a.y1.total_cmp(&b.y1)));
        Ok(kept)
    }
}

/// Parse raw YOLO output rows `[cx, cy, w, h, conf, ...]` above `confidence`.
///
/// Output shape is `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; both are handled.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
) -> Result<Vec<FaceBox>, RecognizerError> {
    if shape.len() != 3 {
        return Err(RecognizerError::Inference(format!(
            "Unexpected YOLO output shape: {shape:?}"
        )));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 {
        return Ok(Vec::new());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let mut boxes = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        boxes.push(FaceBox {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            confidence: conf,
        });
    }
    Ok(boxes)
}

/// Map a box from letterbox coordinates back to the source image.
fn unletterbox(det: &mut FaceBox, scale: f64, pad_x: u32, pad_y: u32) {
    det.x1 = (det.x1 - pad_x as f64) / scale;
    det.y1 = (det.y1 - pad_y as f64) / scale;
    det.x2 = (det.x2 - pad_x as f64) / scale;
    det.y2 = (det.y2 - pad_y as f64) / scale;
}

/// Letterbox-resize an image to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(image: &RgbImage, target_size: u32) -> (ndarray::Array4<f32>, f64, u32, u32) {
    let (src_w, src_h) = image.dimensions();
    let target = target_size as f64;

    let scale = (target / src_w as f64).min(target / src_h as f64);
    let new_w = ((src_w as f64 * scale).round() as u32).min(target_size);
    let new_h = ((src_h as f64 * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h {
        let src_y = ((y as f64 / scale) as u32).min(src_h - 1);
        for x in 0..new_w {
            let src_x = ((x as f64 / scale) as u32).min(src_w - 1);
            let pixel = image.get_pixel(src_x, src_y);
            let (ty, tx) = ((pad_y + y) as usize, (pad_x + x) as usize);
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = pixel.0[c] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [FaceBox], iou_thresh: f64) -> Vec<FaceBox> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<FaceBox> = Vec::new();
    for det in dets.iter() {
        if keep
            .iter()
            .all(|k| bbox_iou(&k.bbox(), &det.bbox()) <= iou_thresh)
        {
            keep.push(det.clone());
        }
    }
    keep
}

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

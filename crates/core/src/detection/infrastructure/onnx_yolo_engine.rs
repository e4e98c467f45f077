/// YOLO object detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, class-aware NMS and the
/// conversion of boxes into normalized, bottom-left-origin model space.
use std::path::Path;

use crate::detection::domain::detect_error::InferError;
use crate::detection::domain::detection::{Detection, LabelCandidate};
use crate::detection::domain::inference_engine::InferenceEngine;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;

use super::class_labels::class_name;
use super::execution_provider::ExecutionTarget;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Candidates scoring below this never leave the engine.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.1;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Number of ranked labels attached to each detection.
pub const DEFAULT_TOP_K: usize = 5;

/// YOLO detector backed by an ONNX Runtime session.
pub struct OnnxYoloEngine {
    session: ort::session::Session,
    class_names: Vec<String>,
    input_size: u32,
    min_confidence: f32,
    top_k: usize,
}

impl OnnxYoloEngine {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        class_names: Vec<String>,
        target: ExecutionTarget,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(target.providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // [N, C, H, W]; square inputs, so H is enough
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded YOLO model {} (input {input_size}x{input_size}, {} classes)",
            model_path.display(),
            class_names.len()
        );

        Ok(Self {
            session,
            class_names,
            input_size,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            top_k: DEFAULT_TOP_K,
        })
    }
}

impl InferenceEngine for OnnxYoloEngine {
    fn infer(&mut self, image: &Frame) -> Result<Vec<Detection>, InferError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let (input_tensor, letterbox) = letterbox(image, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_standard_layout()
            .as_slice()
            .ok_or("Cannot get tensor slice")?
            .to_vec();

        let raw = parse_output(
            &data,
            &shape,
            self.class_names.len(),
            &letterbox,
            self.min_confidence,
        )?;
        let kept = nms(raw, NMS_IOU_THRESH);

        Ok(kept
            .into_iter()
            .map(|det| det.into_detection(&letterbox, &self.class_names, self.top_k))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// How a frame was placed inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
    frame_width: u32,
    frame_height: u32,
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114/255 gray padding, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
            frame_width: frame.width(),
            frame_height: frame.height(),
        },
    )
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// Feature layout of one prediction row.
#[derive(Clone, Copy, Debug, PartialEq)]
enum RowLayout {
    /// `[cx, cy, w, h, objectness, class scores...]` (YOLOv5)
    Objectness,
    /// `[cx, cy, w, h, class scores...]` (anchor-free heads)
    AnchorFree,
}

impl RowLayout {
    fn detect(num_feats: usize, num_classes: usize, transposed: bool) -> Self {
        if num_classes > 0 && num_feats == num_classes + 4 {
            RowLayout::AnchorFree
        } else if num_classes > 0 && num_feats == num_classes + 5 {
            RowLayout::Objectness
        } else if transposed {
            RowLayout::AnchorFree
        } else {
            RowLayout::Objectness
        }
    }

    fn class_offset(self) -> usize {
        match self {
            RowLayout::Objectness => 5,
            RowLayout::AnchorFree => 4,
        }
    }
}

/// A candidate in frame pixel coordinates, before NMS.
#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f32,
    class_index: usize,
    /// `(class index, class score)` for every class.
    class_scores: Vec<(usize, f32)>,
}

fn parse_output(
    data: &[f32],
    shape: &[usize],
    num_classes: usize,
    letterbox: &Letterbox,
    min_confidence: f32,
) -> Result<Vec<RawDetection>, InferError> {
    // [1, detections, features] or the transposed [1, features, detections]
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_dets * num_feats {
        return Err(format!(
            "YOLO output has {} values, shape {shape:?} needs {}",
            data.len(),
            num_dets * num_feats
        )
        .into());
    }

    let layout = RowLayout::detect(num_feats, num_classes, transposed);
    let offset = layout.class_offset();
    if num_feats <= offset {
        return Err(format!("YOLO output rows too short: {num_feats} features").into());
    }

    let mut raw_dets = Vec::new();
    for i in 0..num_dets {
        let row = if transposed {
            (0..num_feats)
                .map(|f| data[f * num_dets + i])
                .collect::<Vec<f32>>()
        } else {
            data[i * num_feats..(i + 1) * num_feats].to_vec()
        };

        let class_scores: Vec<(usize, f32)> = row[offset..].iter().copied().enumerate().collect();
        let Some(&(class_index, best_score)) = class_scores
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        // Objectness is the detection confidence; anchor-free heads have
        // none, so their best class score stands in for it.
        let confidence = match layout {
            RowLayout::Objectness => row[4],
            RowLayout::AnchorFree => best_score,
        };
        if confidence < min_confidence {
            continue;
        }

        let cx = row[0] as f64;
        let cy = row[1] as f64;
        let w = row[2] as f64;
        let h = row[3] as f64;

        // Letterbox coords back to frame coords
        let pad_x = letterbox.pad_x as f64;
        let pad_y = letterbox.pad_y as f64;
        raw_dets.push(RawDetection {
            x1: ((cx - w / 2.0) - pad_x) / letterbox.scale,
            y1: ((cy - h / 2.0) - pad_y) / letterbox.scale,
            x2: ((cx + w / 2.0) - pad_x) / letterbox.scale,
            y2: ((cy + h / 2.0) - pad_y) / letterbox.scale,
            confidence,
            class_index,
            class_scores,
        });
    }
    Ok(raw_dets)
}

impl RawDetection {
    fn into_detection(
        mut self,
        letterbox: &Letterbox,
        class_names: &[String],
        top_k: usize,
    ) -> Detection {
        let fw = letterbox.frame_width as f64;
        let fh = letterbox.frame_height as f64;
        let left = (self.x1 / fw).clamp(0.0, 1.0);
        let right = (self.x2 / fw).clamp(0.0, 1.0);
        let top = (self.y1 / fh).clamp(0.0, 1.0);
        let bottom = (self.y2 / fh).clamp(0.0, 1.0);

        // Model space has its origin at the bottom-left corner
        let bounding_box = NormalizedRect::new(left, 1.0 - bottom, right - left, bottom - top);

        self.class_scores
            .sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let labels = self
            .class_scores
            .iter()
            .take(top_k)
            .map(|&(class, score)| LabelCandidate::new(class_name(class_names, class), score))
            .collect();

        Detection {
            bounding_box,
            confidence: self.confidence,
            labels,
        }
    }
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy per-class NMS: sort by confidence descending, suppress boxes of
/// the same class that overlap a kept one.
fn nms(mut dets: Vec<RawDetection>, iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..dets.len() {
            if suppressed[j] || dets[j].class_index != dets[i].class_index {
                continue;
            }
            let iou = bbox_iou(
                &[dets[i].x1, dets[i].y1, dets[i].x2, dets[i].y2],
                &[dets[j].x1, dets[j].y1, dets[j].x2, dets[j].y2],
            );
            if iou > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    for (det, suppressed) in dets.into_iter().zip(suppressed) {
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}

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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::shared::geometry::{NormalizedRect, Rect};

/// Top-label confidence used when a detection carries no labels, so that
/// it fails any label threshold in [0, 1].
pub const MISSING_LABEL_CONFIDENCE: f32 = -1.0;

/// A class identifier ranked by the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelCandidate {
    pub identifier: String,
    pub confidence: f32,
}

impl LabelCandidate {
    pub fn new(identifier: impl Into<String>, confidence: f32) -> Self {
        Self {
            identifier: identifier.into(),
            confidence,
        }
    }
}

/// Raw model output for one object.
///
/// `bounding_box` is normalized with a bottom-left origin; `labels` are
/// sorted by descending confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bounding_box: NormalizedRect,
    pub confidence: f32,
    pub labels: Vec<LabelCandidate>,
}

impl Detection {
    pub fn top_label(&self) -> Option<&LabelCandidate> {
        self.labels.first()
    }

    pub fn top_label_confidence(&self) -> f32 {
        self.top_label()
            .map_or(MISSING_LABEL_CONFIDENCE, |label| label.confidence)
    }
}

/// A detection placed in the caller's view space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub bounding_box: Rect,
    pub confidence: f32,
    pub labels: Vec<LabelCandidate>,
}

impl DetectionResult {
    pub fn top_label(&self) -> Option<&LabelCandidate> {
        self.labels.first()
    }

    /// `"<identifier>: <confidence>"` with two decimals; the identifier is
    /// empty when there are no labels.
    pub fn caption(&self) -> String {
        let identifier = self.top_label().map_or("", |l| l.identifier.as_str());
        format!("{identifier}: {:.2}", self.confidence)
    }
}

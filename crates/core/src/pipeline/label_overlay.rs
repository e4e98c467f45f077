use crate::detection::domain::detection::DetectionResult;
use crate::shared::geometry::Rect;

/// One on-screen label: a box outline plus its caption.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayLabel {
    pub frame: Rect,
    pub text: String,
}

/// How a reconcile pass changed the label pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub removed: usize,
}

/// A recycled pool of labels kept in 1:1 correspondence with the latest
/// detection results.
#[derive(Debug, Default)]
pub struct LabelOverlay {
    labels: Vec<OverlayLabel>,
}

impl LabelOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grows or shrinks the pool to `results.len()`, then positions and
    /// captions label `i` from result `i`. Surviving labels are reused.
    pub fn reconcile(&mut self, results: &[DetectionResult]) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        while self.labels.len() < results.len() {
            self.labels.push(OverlayLabel::default());
            stats.created += 1;
        }
        while self.labels.len() > results.len() {
            self.labels.pop();
            stats.removed += 1;
        }
        for (label, result) in self.labels.iter_mut().zip(results) {
            label.frame = result.bounding_box;
            label.text = result.caption();
        }
        stats
    }

    pub fn labels(&self) -> &[OverlayLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn clear(&mut self) -> ReconcileStats {
        self.reconcile(&[])
    }
}

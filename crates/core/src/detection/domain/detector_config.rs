use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

pub const DEFAULT_LABEL_CONFIDENCE: f32 = 0.2;
pub const DEFAULT_RESULT_CONFIDENCE: f32 = 0.4;

/// The two independent confidence gates applied to every detection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum confidence of a detection's top label.
    pub label_confidence_threshold: f32,
    /// Minimum overall object confidence.
    pub result_confidence_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            label_confidence_threshold: DEFAULT_LABEL_CONFIDENCE,
            result_confidence_threshold: DEFAULT_RESULT_CONFIDENCE,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("label confidence", self.label_confidence_threshold),
            ("result confidence", self.result_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} threshold must be between 0.0 and 1.0, got {value}"));
            }
        }
        Ok(())
    }
}

/// Thresholds that can be changed through a shared reference.
///
/// Each value is an independent relaxed atomic: a call that starts while
/// the owner is updating may see one old and one new value, which only
/// affects that single call.
#[derive(Debug)]
pub struct SharedThresholds {
    label: AtomicU32,
    result: AtomicU32,
}

impl SharedThresholds {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            label: AtomicU32::new(config.label_confidence_threshold.to_bits()),
            result: AtomicU32::new(config.result_confidence_threshold.to_bits()),
        }
    }

    pub fn snapshot(&self) -> DetectorConfig {
        DetectorConfig {
            label_confidence_threshold: f32::from_bits(self.label.load(Ordering::Relaxed)),
            result_confidence_threshold: f32::from_bits(self.result.load(Ordering::Relaxed)),
        }
    }

    pub fn set_label_confidence_threshold(&self, value: f32) {
        self.label.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_result_confidence_threshold(&self, value: f32) {
        self.result.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn replace(&self, config: DetectorConfig) {
        self.set_label_confidence_threshold(config.label_confidence_threshold);
        self.set_result_confidence_threshold(config.result_confidence_threshold);
    }
}

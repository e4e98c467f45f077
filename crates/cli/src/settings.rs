use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use yolo_lens_core::detection::domain::detector_config::{
    DetectorConfig, DEFAULT_LABEL_CONFIDENCE, DEFAULT_RESULT_CONFIDENCE,
};
use yolo_lens_core::detection::infrastructure::execution_provider::ExecutionTarget;
use yolo_lens_core::shared::constants::{APP_DIR_NAME, DEFAULT_CAPTURE_FPS};
use yolo_lens_core::shared::orientation::CameraPosition;

/// Persisted defaults for every run; command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub label_confidence: f32,
    pub result_confidence: f32,
    pub camera: CameraPosition,
    pub execution: ExecutionTarget,
    pub frame_rate: f64,
    pub workers: usize,
    /// Where to fetch the model when it is neither bundled nor cached.
    pub model_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            label_confidence: DEFAULT_LABEL_CONFIDENCE,
            result_confidence: DEFAULT_RESULT_CONFIDENCE,
            camera: CameraPosition::Back,
            execution: ExecutionTarget::Auto,
            frame_rate: DEFAULT_CAPTURE_FPS,
            workers: 2,
            model_url: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Missing or malformed files yield the defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed settings {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("could not determine config directory")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            label_confidence_threshold: self.label_confidence,
            result_confidence_threshold: self.result_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("none.json")), Settings::default());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "camera": "front", "execution": "cpu" }"#).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.camera, CameraPosition::Front);
        assert_eq!(settings.execution, ExecutionTarget::Cpu);
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.detector_config(), DetectorConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            result_confidence: 0.6,
            model_url: Some("https://example.com/yolov5s.onnx".into()),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }
}

/// Logical name of the bundled detection model.
pub const YOLO_MODEL_NAME: &str = "yolov5s.onnx";

/// Application directory name under the platform cache/config roots.
pub const APP_DIR_NAME: &str = "YoloLens";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Border drawn around each label box in rendered output, in pixels.
pub const LABEL_BORDER_WIDTH: u32 = 3;

/// Default capture rate for simulated camera feeds.
pub const DEFAULT_CAPTURE_FPS: f64 = 30.0;

/// Slowest supported capture rate; slower requests are paced at this rate.
pub const MIN_CAPTURE_FPS: f64 = 0.01;

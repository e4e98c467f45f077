use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detection::domain::image_source::{PixelBuffer, PixelFormat, SampleBuffer};
use crate::shared::constants::{DEFAULT_CAPTURE_FPS, IMAGE_EXTENSIONS};
use crate::shared::orientation::{CameraPosition, Orientation};
use crate::video::domain::capture_source::{frame_interval, CaptureError, CaptureSource};
use crate::video::domain::image_reader::ImageReader;

/// Simulates a camera from a directory of still images.
///
/// Each image is rotated into the sensor orientation of the chosen camera
/// position and delivered as a BGRA sample buffer, so consumers have to
/// apply [`CaptureSource::orientation`] to see it upright again, exactly as
/// with a real device.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    reader: Box<dyn ImageReader>,
    orientation: Orientation,
    frame_interval: Duration,
    next_index: usize,
}

impl ImageSequenceSource {
    /// Collects the image files in `dir`, sorted by name.
    pub fn open(
        dir: &Path,
        reader: Box<dyn ImageReader>,
        position: CameraPosition,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_path(path))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(format!("No images found in {}", dir.display()).into());
        }
        log::info!(
            "Simulating {position} camera from {} images in {}",
            paths.len(),
            dir.display()
        );
        Ok(Self {
            paths,
            reader,
            orientation: Orientation::for_camera(position),
            frame_interval: Duration::from_secs_f64(1.0 / DEFAULT_CAPTURE_FPS),
            next_index: 0,
        })
    }

    /// Spacing of presentation timestamps; unpaced rates keep the default.
    pub fn with_frame_rate(mut self, fps: f64) -> Self {
        if let Some(interval) = frame_interval(fps) {
            self.frame_interval = interval;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn load(&self, index: usize) -> Result<SampleBuffer, CaptureError> {
        let path = &self.paths[index];
        let upright = self
            .reader
            .read(path)
            .and_then(|still| Ok(still.to_frame()?))
            .map_err(|e| -> CaptureError { format!("{}: {e}", path.display()).into() })?;
        let sensor = self.orientation.inverse().apply(&upright);
        let buffer = PixelBuffer::from_frame(&sensor, PixelFormat::Bgra8);
        Ok(SampleBuffer::new(
            Some(buffer),
            self.frame_interval * index as u32,
            index,
        ))
    }
}

impl CaptureSource for ImageSequenceSource {
    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn next_sample(&mut self) -> Option<Result<SampleBuffer, CaptureError>> {
        if self.next_index >= self.paths.len() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(self.load(index))
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

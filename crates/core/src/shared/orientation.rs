use serde::{Deserialize, Serialize};

use super::frame::Frame;
use super::geometry::Size;

/// Which physical camera produced a buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPosition {
    #[default]
    Back,
    Front,
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Back => write!(f, "back"),
            CameraPosition::Front => write!(f, "front"),
        }
    }
}

/// How a buffer's stored pixels relate to the upright image, named after
/// where the upright image's top edge ended up (EXIF orientation tags 1-8).
///
/// `Right` means the stored data must be rotated 90° clockwise to display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl Orientation {
    /// Orientation hint for live buffers from the given camera.
    ///
    /// The back sensor is mounted landscape, so portrait frames arrive
    /// rotated; the front camera delivers them upright.
    pub fn for_camera(position: CameraPosition) -> Self {
        match position {
            CameraPosition::Back => Orientation::Right,
            CameraPosition::Front => Orientation::Up,
        }
    }

    pub fn from_exif(value: u8) -> Option<Self> {
        Some(match value {
            1 => Orientation::Up,
            2 => Orientation::UpMirrored,
            3 => Orientation::Down,
            4 => Orientation::DownMirrored,
            5 => Orientation::LeftMirrored,
            6 => Orientation::Right,
            7 => Orientation::RightMirrored,
            8 => Orientation::Left,
            _ => return None,
        })
    }

    /// True for the quarter-turn orientations, whose upright image has
    /// width and height swapped relative to the stored buffer.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Left
                | Orientation::Right
                | Orientation::LeftMirrored
                | Orientation::RightMirrored
        )
    }

    /// Size of the upright image for a stored buffer of `stored` size.
    pub fn upright_size(self, stored: Size) -> Size {
        if self.swaps_dimensions() {
            Size::new(stored.height, stored.width)
        } else {
            stored
        }
    }

    /// The orientation that undoes `self`: `o.inverse().apply(&o.apply(f)) == f`.
    pub fn inverse(self) -> Self {
        match self {
            Orientation::Right => Orientation::Left,
            Orientation::Left => Orientation::Right,
            other => other,
        }
    }

    /// Re-orients stored pixel data so the result is upright.
    pub fn apply(self, frame: &Frame) -> Frame {
        if self == Orientation::Up {
            return frame.clone();
        }

        let (sw, sh) = (frame.width(), frame.height());
        let (ow, oh) = if self.swaps_dimensions() {
            (sh, sw)
        } else {
            (sw, sh)
        };

        let mut out = Frame::new(vec![0u8; frame.data().len()], ow, oh, frame.index());
        for oy in 0..oh {
            for ox in 0..ow {
                let (sx, sy) = self.source_coords(ox, oy, sw, sh);
                out.put_pixel(ox, oy, frame.pixel(sx, sy));
            }
        }
        out
    }

    /// Maps an output (upright) pixel back to its stored location for a
    /// stored buffer of `w` x `h`.
    fn source_coords(self, ox: u32, oy: u32, w: u32, h: u32) -> (u32, u32) {
        match self {
            Orientation::Up => (ox, oy),
            Orientation::UpMirrored => (w - 1 - ox, oy),
            Orientation::Down => (w - 1 - ox, h - 1 - oy),
            Orientation::DownMirrored => (ox, h - 1 - oy),
            Orientation::LeftMirrored => (oy, ox),
            Orientation::Right => (oy, h - 1 - ox),
            Orientation::RightMirrored => (w - 1 - oy, h - 1 - ox),
            Orientation::Left => (w - 1 - oy, ox),
        }
    }
}

use serde::{Deserialize, Serialize};

/// Width and height in pixels (or points, for view sizes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned rectangle in a top-left-origin pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Where an image of `image` size is drawn inside `dest` when scaled to
    /// fit while preserving aspect ratio, centered on both axes.
    ///
    /// Returns an empty rect at the destination center if either size is empty.
    pub fn aspect_fit(image: Size, dest: Size) -> Self {
        if image.is_empty() || dest.is_empty() {
            return Self::new(dest.width / 2.0, dest.height / 2.0, 0.0, 0.0);
        }
        let scale = (dest.width / image.width).min(dest.height / image.height);
        let w = image.width * scale;
        let h = image.height * scale;
        Self::new((dest.width - w) / 2.0, (dest.height - h) / 2.0, w, h)
    }

    /// Canonical form with non-negative width and height.
    ///
    /// A negative extent moves the origin to the opposite edge, so the
    /// covered area is unchanged.
    pub fn standardized(&self) -> Self {
        let mut r = *self;
        if r.width < 0.0 {
            r.x += r.width;
            r.width = -r.width;
        }
        if r.height < 0.0 {
            r.y += r.height;
            r.height = -r.height;
        }
        r
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn min_x(&self) -> f64 {
        self.standardized().x
    }

    pub fn min_y(&self) -> f64 {
        self.standardized().y
    }

    pub fn max_x(&self) -> f64 {
        let s = self.standardized();
        s.x + s.width
    }

    pub fn max_y(&self) -> f64 {
        let s = self.standardized();
        s.y + s.height
    }

    /// True when `other` lies inside `self`, allowing `tolerance` of slack
    /// on every edge for accumulated floating-point error.
    pub fn contains_rect(&self, other: &Rect, tolerance: f64) -> bool {
        other.min_x() >= self.min_x() - tolerance
            && other.min_y() >= self.min_y() - tolerance
            && other.max_x() <= self.max_x() + tolerance
            && other.max_y() <= self.max_y() + tolerance
    }
}

/// Rectangle expressed as fractions of an image's width and height.
///
/// Model output uses a bottom-left origin; see [`NormalizedRect::flipped_vertically`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Mirrors the rect about the horizontal center line of the unit square,
    /// switching between bottom-left and top-left origin conventions.
    pub fn flipped_vertically(&self) -> Self {
        Self::new(self.x, 1.0 - self.y - self.height, self.width, self.height)
    }
}

//! Axis-aligned boxes and overlap primitives.
//!
//! Boxes are plain `Copy` values in whatever coordinate space the anchors use
//! (normalized or pixel). Malformed boxes are tolerated: their area clamps to
//! zero instead of failing.

/// Axis-aligned box given by its min and max corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    /// Minimum x coordinate.
    pub xmin: f32,
    /// Minimum y coordinate.
    pub ymin: f32,
    /// Maximum x coordinate.
    pub xmax: f32,
    /// Maximum y coordinate.
    pub ymax: f32,
}

impl BBox {
    /// Creates a box from its corners.
    pub const fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Creates a box from a `[xmin, ymin, xmax, ymax]` slice of at least four values.
    pub(crate) fn from_slice(values: &[f32]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    /// Creates a box centered at `(cx, cy)` with the given size.
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    /// Extent along x (may be negative for malformed boxes).
    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    /// Extent along y (may be negative for malformed boxes).
    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    /// Center point `(cx, cy)`.
    pub fn center(&self) -> (f32, f32) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    /// Area, clamped to zero if either extent is negative.
    pub fn area(&self) -> f32 {
        area(self)
    }

    /// Returns the coordinates as `[xmin, ymin, xmax, ymax]`.
    pub fn to_array(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Intersection of two boxes.
///
/// Returns the all-zero box when the boxes are separated on either axis.
/// Touching edges are not separated and yield a zero-extent box.
pub fn intersect(a: &BBox, b: &BBox) -> BBox {
    if b.xmin > a.xmax || b.xmax < a.xmin || b.ymin > a.ymax || b.ymax < a.ymin {
        return BBox::default();
    }
    BBox {
        xmin: a.xmin.max(b.xmin),
        ymin: a.ymin.max(b.ymin),
        xmax: a.xmax.min(b.xmax),
        ymax: a.ymax.min(b.ymax),
    }
}

/// Area of a box, clamped to zero if either extent is negative.
pub fn area(bbox: &BBox) -> f32 {
    let width = bbox.width();
    let height = bbox.height();
    if width < 0.0 || height < 0.0 {
        0.0
    } else {
        width * height
    }
}

/// Jaccard overlap (intersection over union) of two boxes.
///
/// Exactly zero unless the intersection has strictly positive width and height.
pub fn overlap(a: &BBox, b: &BBox) -> f32 {
    let inter = intersect(a, b);
    let width = inter.width();
    let height = inter.height();
    if width > 0.0 && height > 0.0 {
        let inter_area = width * height;
        inter_area / (area(a) + area(b) - inter_area)
    } else {
        0.0
    }
}

//! Box geometry: corners, IoU, clipping and regression deltas.
//!
//! Boxes use the TLBR corner convention `(y1, x1, y2, x2)` in image pixel
//! space, y before x. After clipping, `y2 >= y1` and `x2 >= x1` hold; the
//! invariant may be violated transiently by a freshly decoded box. An
//! all-zero box is the padding sentinel throughout the crate and must be
//! treated as "no object", never as a detection at the origin.

use crate::util::{DetGeomError, DetGeomResult};

/// Axis-aligned box with TLBR corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BBox {
    pub y1: f32,
    pub x1: f32,
    pub y2: f32,
    pub x2: f32,
}

impl BBox {
    /// Creates a box from its corners.
    pub fn new(y1: f32, x1: f32, y2: f32, x2: f32) -> Self {
        Self { y1, x1, y2, x2 }
    }

    /// Creates a box from a center point and extents.
    pub fn from_center(cy: f32, cx: f32, height: f32, width: f32) -> Self {
        Self {
            y1: cy - height / 2.0,
            x1: cx - width / 2.0,
            y2: cy + height / 2.0,
            x2: cx + width / 2.0,
        }
    }

    /// Returns the box height.
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Returns the box width.
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    /// Returns the center point as `(cy, cx)`.
    pub fn center(&self) -> (f32, f32) {
        (
            self.y1 + self.height() / 2.0,
            self.x1 + self.width() / 2.0,
        )
    }

    /// Returns the area, zero for inverted corners.
    pub fn area(&self) -> f32 {
        self.height().max(0.0) * self.width().max(0.0)
    }

    /// Returns true for the zero-area padding sentinel.
    pub fn is_empty(&self) -> bool {
        self.height() <= 0.0 || self.width() <= 0.0
    }

    /// Truncates the corners to `[0, height] x [0, width]`.
    pub fn clip(&self, height: f32, width: f32) -> Self {
        Self {
            y1: self.y1.clamp(0.0, height),
            x1: self.x1.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
        }
    }
}

/// True (unpadded) image extent and preprocessing scale factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageMeta {
    /// Image height in pixels after preprocessing.
    pub height: f32,
    /// Image width in pixels after preprocessing.
    pub width: f32,
    /// Scale factor applied during preprocessing.
    pub scale: f32,
}

impl ImageMeta {
    /// Creates metadata for a scaled image.
    pub fn new(height: f32, width: f32, scale: f32) -> Self {
        Self {
            height,
            width,
            scale,
        }
    }

    /// Clips a box to this image's extent.
    pub fn clip(&self, bbox: BBox) -> BBox {
        bbox.clip(self.height, self.width)
    }

    /// Validates the metadata before a stage consumes it.
    pub fn validate(&self) -> DetGeomResult<()> {
        let ok = self.height.is_finite()
            && self.height > 0.0
            && self.width.is_finite()
            && self.width > 0.0
            && self.scale.is_finite()
            && self.scale > 0.0;
        if !ok {
            return Err(DetGeomError::InvalidConfig {
                context: "image metadata",
                reason: "extent and scale must be positive and finite",
            });
        }
        Ok(())
    }
}

/// Regression deltas relating a reference box to a target box.
///
/// `(dy, dx)` translate the center in units of the reference extent and
/// `(dh, dw)` scale the extent logarithmically.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoxDelta {
    pub dy: f32,
    pub dx: f32,
    pub dh: f32,
    pub dw: f32,
}

/// Largest magnitude accepted for `dh`/`dw` before exponentiation: ln(1000/16).
/// Keeps a wild network output from overflowing the decoded extent.
const DELTA_EXP_CLAMP: f32 = 4.135_166_6;

/// Encodes `target` relative to `reference`.
///
/// The reference must have positive extent; callers filter degenerate boxes
/// before encoding.
pub fn encode(reference: BBox, target: BBox) -> BoxDelta {
    let (ry, rx) = reference.center();
    let rh = reference.height();
    let rw = reference.width();
    let (ty, tx) = target.center();

    BoxDelta {
        dy: (ty - ry) / rh,
        dx: (tx - rx) / rw,
        dh: (target.height() / rh).ln(),
        dw: (target.width() / rw).ln(),
    }
}

/// Applies `delta` to `reference`, inverting [`encode`].
///
/// `dh`/`dw` are clamped before exponentiation, so the result is finite for
/// any finite input. The decoded box is not clipped.
pub fn decode(reference: BBox, delta: BoxDelta) -> BBox {
    let (ry, rx) = reference.center();
    let rh = reference.height();
    let rw = reference.width();

    let cy = ry + delta.dy * rh;
    let cx = rx + delta.dx * rw;
    let h = rh * delta.dh.clamp(-DELTA_EXP_CLAMP, DELTA_EXP_CLAMP).exp();
    let w = rw * delta.dw.clamp(-DELTA_EXP_CLAMP, DELTA_EXP_CLAMP).exp();

    BBox::from_center(cy, cx, h, w)
}

/// Intersection-over-union of two boxes.
///
/// Symmetric, 0 for disjoint or degenerate boxes, 1 iff the boxes are
/// identical and non-degenerate.
pub fn iou(a: BBox, b: BBox) -> f32 {
    let iy1 = a.y1.max(b.y1);
    let ix1 = a.x1.max(b.x1);
    let iy2 = a.y2.min(b.y2);
    let ix2 = a.x2.min(b.x2);

    let ih = (iy2 - iy1).max(0.0);
    let iw = (ix2 - ix1).max(0.0);
    let intersection = ih * iw;
    if intersection <= 0.0 {
        return 0.0;
    }

    let union = a.area() + b.area() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

/// Returns the indices of boxes whose width and height both reach `minimum_size`.
pub fn filter_by_size(boxes: &[BBox], minimum_size: f32) -> Vec<usize> {
    boxes
        .iter()
        .enumerate()
        .filter(|(_, b)| b.width() >= minimum_size && b.height() >= minimum_size)
        .map(|(idx, _)| idx)
        .collect()
}

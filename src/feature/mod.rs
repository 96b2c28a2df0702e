//! Borrowed views over channel-last feature maps.
//!
//! `FeatureView` is a zero-copy `(H, W, C)` view into a flat `f32` buffer in
//! row-major, channel-last order: element `(y, x, c)` lives at
//! `(y * W + x) * C + c`. Construction validates the buffer length so stage
//! code can index without rechecking bounds.

use crate::util::{DetGeomError, DetGeomResult};

/// Borrowed channel-last feature map view.
#[derive(Copy, Clone)]
pub struct FeatureView<'a> {
    data: &'a [f32],
    height: usize,
    width: usize,
    channels: usize,
}

impl<'a> FeatureView<'a> {
    /// Creates a view over a contiguous `(height, width, channels)` buffer.
    pub fn new(
        data: &'a [f32],
        height: usize,
        width: usize,
        channels: usize,
    ) -> DetGeomResult<Self> {
        if height == 0 || width == 0 || channels == 0 {
            return Err(DetGeomError::InvalidDimensions {
                height,
                width,
                channels,
            });
        }
        let needed = height
            .checked_mul(width)
            .and_then(|v| v.checked_mul(channels))
            .ok_or(DetGeomError::InvalidDimensions {
                height,
                width,
                channels,
            })?;
        if data.len() < needed {
            return Err(DetGeomError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            height,
            width,
            channels,
        })
    }

    /// Returns the spatial height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the spatial width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the backing slice.
    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }

    /// Returns the channel vector at `(y, x)`.
    ///
    /// Callers pass coordinates already clamped to the spatial extent.
    pub fn at(&self, y: usize, x: usize) -> &'a [f32] {
        debug_assert!(y < self.height && x < self.width);
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }
}

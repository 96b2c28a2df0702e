//! Region-of-interest pooling via bilinear alignment.

use crate::feature::FeatureView;
use crate::geom::{BBox, ImageMeta};
use crate::trace::{trace_event, trace_span};
use crate::util::{DetGeomError, DetGeomResult};

/// Fixed-size feature patches pooled per proposal.
///
/// Row-major `(proposal, row, col, channel)` layout, one `(height, width,
/// channels)` patch per input proposal.
#[derive(Clone, Debug, PartialEq)]
pub struct PooledFeatures {
    data: Vec<f32>,
    count: usize,
    height: usize,
    width: usize,
    channels: usize,
}

impl PooledFeatures {
    /// Number of pooled patches.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Patch height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Patch width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Channels per patch cell.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns the flat backing buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns one proposal's `(height, width, channels)` patch.
    pub fn patch(&self, index: usize) -> Option<&[f32]> {
        if index >= self.count {
            return None;
        }
        let len = self.height * self.width * self.channels;
        Some(&self.data[index * len..(index + 1) * len])
    }
}

/// Pools a fixed `(output_height, output_width)` patch per proposal.
///
/// Proposal corners are scaled from image space into feature-map space by
/// `(Hf / imageHeight, Wf / imageWidth)`; each output cell samples the
/// feature map bilinearly at its bin center, clamping reads to the map edge.
/// Zero-area proposals (including padding rows) produce all-zero patches.
pub fn roi_align(
    feature: FeatureView<'_>,
    meta: ImageMeta,
    proposals: &[BBox],
    output_height: usize,
    output_width: usize,
) -> DetGeomResult<PooledFeatures> {
    meta.validate()?;
    if output_height == 0 || output_width == 0 {
        return Err(DetGeomError::InvalidDimensions {
            height: output_height,
            width: output_width,
            channels: feature.channels(),
        });
    }

    let _span = trace_span!("roi_align", proposals = proposals.len()).entered();

    let channels = feature.channels();
    let patch_len = output_height * output_width * channels;
    let mut data = vec![0.0f32; proposals.len() * patch_len];

    let scale_y = feature.height() as f32 / meta.height;
    let scale_x = feature.width() as f32 / meta.width;

    let mut degenerate = 0usize;
    for (p, proposal) in proposals.iter().enumerate() {
        if proposal.is_empty() {
            degenerate += 1;
            continue;
        }

        let fy1 = proposal.y1 * scale_y;
        let fx1 = proposal.x1 * scale_x;
        let bin_h = proposal.height() * scale_y / output_height as f32;
        let bin_w = proposal.width() * scale_x / output_width as f32;

        for row in 0..output_height {
            let y = fy1 + (row as f32 + 0.5) * bin_h;
            for col in 0..output_width {
                let x = fx1 + (col as f32 + 0.5) * bin_w;
                let start = (p * output_height * output_width + row * output_width + col)
                    * channels;
                sample_bilinear(feature, y, x, &mut data[start..start + channels]);
            }
        }
    }
    if degenerate > 0 {
        trace_event!("degenerate_proposals", count = degenerate);
    }

    Ok(PooledFeatures {
        data,
        count: proposals.len(),
        height: output_height,
        width: output_width,
        channels,
    })
}

/// Bilinearly interpolates all channels at a fractional feature-map point.
///
/// Sample points are bin centers, so `(y, x)` is shifted by half a cell onto
/// the pixel-center grid and clamped to the map edge.
fn sample_bilinear(feature: FeatureView<'_>, y: f32, x: f32, out: &mut [f32]) {
    let max_y = (feature.height() - 1) as f32;
    let max_x = (feature.width() - 1) as f32;
    let y = (y - 0.5).clamp(0.0, max_y);
    let x = (x - 0.5).clamp(0.0, max_x);

    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(feature.height() - 1);
    let x1 = (x0 + 1).min(feature.width() - 1);
    let wy = y - y0 as f32;
    let wx = x - x0 as f32;

    let tl = feature.at(y0, x0);
    let tr = feature.at(y0, x1);
    let bl = feature.at(y1, x0);
    let br = feature.at(y1, x1);
    for c in 0..out.len() {
        let top = tl[c] + (tr[c] - tl[c]) * wx;
        let bottom = bl[c] + (br[c] - bl[c]) * wx;
        out[c] = top + (bottom - top) * wy;
    }
}

//! First-stage object proposal: decode, filter, suppress, truncate.

use crate::candidate::nms::nms;
use crate::candidate::topk::top_k_indices;
use crate::geom::{decode, filter_by_size, BBox, BoxDelta, ImageMeta};
use crate::trace::{trace_event, trace_span};
use crate::util::{DetGeomError, DetGeomResult};

/// Configuration for proposal generation.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalConfig {
    /// Minimum box side length in original-image pixels; scaled by the
    /// image's preprocessing scale factor before filtering.
    pub minimum_size: f32,
    /// IoU threshold for proposal suppression.
    pub nms_threshold: f32,
    /// Number of top-scoring candidates entering suppression.
    pub pre_nms_top_n: usize,
    /// Fixed output length; shorter results are zero-padded.
    pub post_nms_top_n: usize,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            minimum_size: 16.0,
            nms_threshold: 0.7,
            pre_nms_top_n: 6000,
            post_nms_top_n: 300,
        }
    }
}

impl ProposalConfig {
    /// Validates the configuration, eagerly, before any decoding runs.
    pub fn validate(&self) -> DetGeomResult<()> {
        if !(self.minimum_size.is_finite() && self.minimum_size >= 0.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal",
                reason: "minimum_size must be non-negative",
            });
        }
        if !(self.nms_threshold > 0.0 && self.nms_threshold < 1.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal",
                reason: "nms_threshold must lie in (0, 1)",
            });
        }
        if self.pre_nms_top_n == 0 || self.post_nms_top_n == 0 {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal",
                reason: "pre_nms_top_n and post_nms_top_n must be positive",
            });
        }
        Ok(())
    }
}

/// Fixed-length proposal set for one image.
///
/// `boxes` and `scores` always have length `post_nms_top_n`; rows at
/// `valid..` are all-zero padding so the shape is invariant across images.
#[derive(Clone, Debug, PartialEq)]
pub struct Proposals {
    pub boxes: Vec<BBox>,
    pub scores: Vec<f32>,
    pub valid: usize,
}

impl Proposals {
    /// Returns the non-padding proposal boxes.
    pub fn valid_boxes(&self) -> &[BBox] {
        &self.boxes[..self.valid]
    }

    /// Returns the non-padding objectness scores.
    pub fn valid_scores(&self) -> &[f32] {
        &self.scores[..self.valid]
    }
}

/// Decodes per-anchor network outputs into suppressed, top-K proposals.
///
/// Every anchor is decoded with its predicted delta and clipped to the image;
/// candidates smaller than the scaled minimum size are dropped, the
/// `pre_nms_top_n` best survivors enter NMS, and the kept boxes are truncated
/// to `post_nms_top_n` and zero-padded to a fixed length.
pub fn propose(
    anchors: &[BBox],
    meta: ImageMeta,
    deltas: &[BoxDelta],
    scores: &[f32],
    cfg: &ProposalConfig,
) -> DetGeomResult<Proposals> {
    cfg.validate()?;
    meta.validate()?;
    if deltas.len() != anchors.len() {
        return Err(DetGeomError::ShapeMismatch {
            expected: anchors.len(),
            got: deltas.len(),
            context: "proposal deltas",
        });
    }
    if scores.len() != anchors.len() {
        return Err(DetGeomError::ShapeMismatch {
            expected: anchors.len(),
            got: scores.len(),
            context: "proposal scores",
        });
    }

    let _span = trace_span!("propose", anchors = anchors.len()).entered();

    let decoded: Vec<BBox> = anchors
        .iter()
        .zip(deltas)
        .map(|(anchor, delta)| meta.clip(decode(*anchor, *delta)))
        .collect();

    let sized = filter_by_size(&decoded, cfg.minimum_size * meta.scale);
    let sized_scores: Vec<f32> = sized.iter().map(|&i| scores[i]).collect();

    let top: Vec<usize> = top_k_indices(&sized_scores, cfg.pre_nms_top_n)
        .into_iter()
        .map(|i| sized[i])
        .collect();
    let top_boxes: Vec<BBox> = top.iter().map(|&i| decoded[i]).collect();
    let top_scores: Vec<f32> = top.iter().map(|&i| scores[i]).collect();

    let kept = nms(
        &top_boxes,
        &top_scores,
        cfg.nms_threshold,
        Some(cfg.post_nms_top_n),
    )?;
    trace_event!(
        "proposals",
        candidates = sized.len(),
        suppressed_input = top_boxes.len(),
        kept = kept.len()
    );

    let mut boxes = vec![BBox::default(); cfg.post_nms_top_n];
    let mut out_scores = vec![0.0f32; cfg.post_nms_top_n];
    for (row, &i) in kept.iter().enumerate() {
        boxes[row] = top_boxes[i];
        out_scores[row] = top_scores[i];
    }

    Ok(Proposals {
        boxes,
        scores: out_scores,
        valid: kept.len(),
    })
}

//! Final detection decoding: per-category refinement and suppression.

use crate::candidate::nms::nms;
use crate::geom::{decode, BBox, BoxDelta, ImageMeta};
use crate::trace::{trace_event, trace_span};
use crate::util::{DetGeomError, DetGeomResult};

/// Configuration for detection decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionConfig {
    /// Minimum per-category score for a decoded box to survive.
    pub score_threshold: f32,
    /// IoU threshold for the per-category suppression.
    pub nms_threshold: f32,
    /// Fixed output length; shorter results are zero-padded.
    pub max_detections: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.05,
            nms_threshold: 0.3,
            max_detections: 100,
        }
    }
}

impl DetectionConfig {
    /// Validates the configuration, eagerly, before any decoding runs.
    pub fn validate(&self) -> DetGeomResult<()> {
        if !(self.score_threshold.is_finite() && (0.0..=1.0).contains(&self.score_threshold)) {
            return Err(DetGeomError::InvalidConfig {
                context: "detection",
                reason: "score_threshold must lie in [0, 1]",
            });
        }
        if !(self.nms_threshold > 0.0 && self.nms_threshold < 1.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "detection",
                reason: "nms_threshold must lie in (0, 1)",
            });
        }
        if self.max_detections == 0 {
            return Err(DetGeomError::InvalidConfig {
                context: "detection",
                reason: "max_detections must be positive",
            });
        }
        Ok(())
    }
}

/// Fixed-length detection set for one image.
///
/// Rows at `valid..` are padding: all-zero boxes, category 0 and zero scores.
#[derive(Clone, Debug, PartialEq)]
pub struct Detections {
    pub boxes: Vec<BBox>,
    pub categories: Vec<usize>,
    pub scores: Vec<f32>,
    pub valid: usize,
}

impl Detections {
    /// Returns the non-padding detection boxes.
    pub fn valid_boxes(&self) -> &[BBox] {
        &self.boxes[..self.valid]
    }

    /// Returns the non-padding category ids.
    pub fn valid_categories(&self) -> &[usize] {
        &self.categories[..self.valid]
    }

    /// Returns the non-padding scores.
    pub fn valid_scores(&self) -> &[f32] {
        &self.scores[..self.valid]
    }
}

/// Decodes per-category network outputs into final detections.
///
/// `deltas` has `4 * num_categories` values per proposal and `scores` has
/// `num_categories` values per proposal, category-major within a row.
/// Category 0 is background and produces no detections. For each remaining
/// category the category's delta slot is decoded against every non-padding
/// proposal, clipped, thresholded on score and suppressed independently;
/// survivors from all categories merge by descending score into a
/// `max_detections`-row zero-padded output.
pub fn decode_detections(
    proposals: &[BBox],
    deltas: &[f32],
    scores: &[f32],
    num_categories: usize,
    meta: ImageMeta,
    cfg: &DetectionConfig,
) -> DetGeomResult<Detections> {
    cfg.validate()?;
    meta.validate()?;
    if num_categories < 2 {
        return Err(DetGeomError::InvalidConfig {
            context: "detection",
            reason: "num_categories must include background and one category",
        });
    }
    if deltas.len() != proposals.len() * 4 * num_categories {
        return Err(DetGeomError::ShapeMismatch {
            expected: proposals.len() * 4 * num_categories,
            got: deltas.len(),
            context: "detection deltas",
        });
    }
    if scores.len() != proposals.len() * num_categories {
        return Err(DetGeomError::ShapeMismatch {
            expected: proposals.len() * num_categories,
            got: scores.len(),
            context: "detection scores",
        });
    }

    let _span = trace_span!("decode_detections", proposals = proposals.len()).entered();

    struct Candidate {
        bbox: BBox,
        category: usize,
        score: f32,
    }

    let mut merged: Vec<Candidate> = Vec::new();
    for category in 1..num_categories {
        let mut cat_boxes: Vec<BBox> = Vec::new();
        let mut cat_scores: Vec<f32> = Vec::new();
        for (p, proposal) in proposals.iter().enumerate() {
            if proposal.is_empty() {
                continue;
            }
            let score = scores[p * num_categories + category];
            if score < cfg.score_threshold {
                continue;
            }
            let slot = p * 4 * num_categories + 4 * category;
            let delta = BoxDelta {
                dy: deltas[slot],
                dx: deltas[slot + 1],
                dh: deltas[slot + 2],
                dw: deltas[slot + 3],
            };
            let bbox = meta.clip(decode(*proposal, delta));
            if bbox.is_empty() {
                continue;
            }
            cat_boxes.push(bbox);
            cat_scores.push(score);
        }

        for i in nms(&cat_boxes, &cat_scores, cfg.nms_threshold, None)? {
            merged.push(Candidate {
                bbox: cat_boxes[i],
                category,
                score: cat_scores[i],
            });
        }
    }

    // Stable sort: equal scores keep category-then-suppression order.
    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(cfg.max_detections);
    trace_event!("detections", kept = merged.len());

    let mut boxes = vec![BBox::default(); cfg.max_detections];
    let mut categories = vec![0usize; cfg.max_detections];
    let mut out_scores = vec![0.0f32; cfg.max_detections];
    for (row, candidate) in merged.iter().enumerate() {
        boxes[row] = candidate.bbox;
        categories[row] = candidate.category;
        out_scores[row] = candidate.score;
    }

    Ok(Detections {
        boxes,
        categories,
        scores: out_scores,
        valid: merged.len(),
    })
}

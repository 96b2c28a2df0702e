//! Anchor labeling and regression targets for first-stage training.

use crate::geom::{encode, BBox, BoxDelta, ImageMeta};
use crate::target::sampler::sample_excess;
use crate::target::{overlaps, Label};
use crate::trace::{trace_event, trace_span};
use crate::util::{DetGeomError, DetGeomResult};
use rand::Rng;

/// Configuration for anchor target assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorTargetConfig {
    /// Anchors whose best ground-truth IoU reaches this become foreground.
    pub positive_threshold: f32,
    /// Anchors whose best ground-truth IoU stays below this become background.
    pub negative_threshold: f32,
    /// Fraction of the sample budget reserved for foreground anchors.
    pub fg_fraction: f32,
    /// Total number of anchors kept as foreground + background per image.
    pub batch_size: usize,
    /// Slack, in pixels, allowed when testing whether an anchor lies inside
    /// the image. Anchors further out are ignored entirely.
    pub allowed_border: f32,
}

impl Default for AnchorTargetConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 0.7,
            negative_threshold: 0.3,
            fg_fraction: 0.5,
            batch_size: 256,
            allowed_border: 0.0,
        }
    }
}

impl AnchorTargetConfig {
    /// Validates the configuration, eagerly, before any assignment runs.
    pub fn validate(&self) -> DetGeomResult<()> {
        let thresholds_ok = self.positive_threshold.is_finite()
            && self.negative_threshold.is_finite()
            && (0.0..=1.0).contains(&self.positive_threshold)
            && (0.0..=1.0).contains(&self.negative_threshold);
        if !thresholds_ok {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor target",
                reason: "IoU thresholds must lie in [0, 1]",
            });
        }
        if self.positive_threshold <= self.negative_threshold {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor target",
                reason: "positive_threshold must exceed negative_threshold",
            });
        }
        if !(self.fg_fraction > 0.0 && self.fg_fraction <= 1.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor target",
                reason: "fg_fraction must lie in (0, 1]",
            });
        }
        if self.batch_size == 0 {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor target",
                reason: "batch_size must be positive",
            });
        }
        if !(self.allowed_border.is_finite() && self.allowed_border >= 0.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor target",
                reason: "allowed_border must be non-negative",
            });
        }
        Ok(())
    }
}

/// Dense per-anchor training targets.
///
/// Both vectors have one entry per input anchor; `deltas` is meaningful only
/// where the label is [`Label::Foreground`].
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorTargets {
    pub labels: Vec<Label>,
    pub deltas: Vec<BoxDelta>,
}

impl AnchorTargets {
    /// Number of foreground-labeled anchors.
    pub fn foreground_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_foreground()).count()
    }

    /// Number of background-labeled anchors.
    pub fn background_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_background()).count()
    }
}

/// Labels every anchor against the image's ground truth.
///
/// Anchors outside the image (beyond `allowed_border`) are ignored. Each
/// remaining anchor is labeled by its best-overlap ground truth: foreground at
/// or above `positive_threshold`, background below `negative_threshold`. Every
/// ground-truth box with nonzero overlap additionally claims its best-matching
/// anchors as foreground even below the threshold, so no ground truth goes
/// unmatched. Foreground then background are subsampled to the configured
/// budget; excess anchors are relabeled ignore, keeping the output dense.
///
/// Zero-area ground-truth rows are padding and never participate.
pub fn anchor_targets<R: Rng + ?Sized>(
    anchors: &[BBox],
    gt_boxes: &[BBox],
    meta: ImageMeta,
    cfg: &AnchorTargetConfig,
    rng: &mut R,
) -> DetGeomResult<AnchorTargets> {
    cfg.validate()?;
    meta.validate()?;

    let _span = trace_span!("anchor_target", anchors = anchors.len()).entered();

    let mut labels = vec![Label::Ignore; anchors.len()];
    let mut deltas = vec![BoxDelta::default(); anchors.len()];

    let border = cfg.allowed_border;
    let inside: Vec<usize> = (0..anchors.len())
        .filter(|&i| {
            let a = &anchors[i];
            a.y1 >= -border
                && a.x1 >= -border
                && a.y2 <= meta.height + border
                && a.x2 <= meta.width + border
        })
        .collect();

    let valid_gts: Vec<BBox> = gt_boxes.iter().filter(|b| !b.is_empty()).copied().collect();
    let dropped_gts = gt_boxes.len() - valid_gts.len();
    if dropped_gts > 0 {
        trace_event!("degenerate_ground_truth", count = dropped_gts);
    }

    let inside_boxes: Vec<BBox> = inside.iter().map(|&i| anchors[i]).collect();
    let matches = overlaps(&inside_boxes, &valid_gts);
    let g = valid_gts.len();

    // Background below the negative threshold; assigned before foreground so
    // the forced per-ground-truth matches override it.
    for (k, &anchor_idx) in inside.iter().enumerate() {
        if matches.max_iou[k] < cfg.negative_threshold {
            labels[anchor_idx] = Label::Background;
        }
    }

    // Every ground truth with nonzero overlap claims its best anchors, ties
    // included, so regression targets exist for each object.
    for j in 0..g {
        if matches.gt_max[j] <= 0.0 {
            continue;
        }
        for (k, &anchor_idx) in inside.iter().enumerate() {
            if matches.matrix[k * g + j] == matches.gt_max[j] {
                labels[anchor_idx] = Label::Foreground;
            }
        }
    }

    for (k, &anchor_idx) in inside.iter().enumerate() {
        if matches.max_iou[k] >= cfg.positive_threshold {
            labels[anchor_idx] = Label::Foreground;
        }
    }

    let mut fg: Vec<usize> = inside
        .iter()
        .copied()
        .filter(|&i| labels[i].is_foreground())
        .collect();
    let fg_budget = (cfg.fg_fraction * cfg.batch_size as f32).round() as usize;
    for idx in sample_excess(&mut fg, fg_budget, rng) {
        labels[idx] = Label::Ignore;
    }

    let mut bg: Vec<usize> = inside
        .iter()
        .copied()
        .filter(|&i| labels[i].is_background())
        .collect();
    let bg_budget = cfg.batch_size.saturating_sub(fg.len());
    for idx in sample_excess(&mut bg, bg_budget, rng) {
        labels[idx] = Label::Ignore;
    }

    for (k, &anchor_idx) in inside.iter().enumerate() {
        if labels[anchor_idx].is_foreground() {
            let gt = valid_gts[matches.assigned[k]];
            deltas[anchor_idx] = encode(anchors[anchor_idx], gt);
        }
    }

    trace_event!("anchor_target_sample", foreground = fg.len(), background = bg.len());

    Ok(AnchorTargets { labels, deltas })
}

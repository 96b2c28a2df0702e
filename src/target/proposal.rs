//! Balanced second-stage sampling with per-category regression targets.

use crate::geom::{encode, BBox, ImageMeta};
use crate::target::overlaps;
use crate::target::sampler::sample_at_most;
use crate::trace::{trace_event, trace_span};
use crate::util::{DetGeomError, DetGeomResult};
use rand::Rng;

/// Configuration for proposal target sampling.
///
/// Category index 0 is the background class; `num_categories` counts it.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalTargetConfig {
    /// Proposals whose best ground-truth IoU reaches this become foreground.
    pub fg_threshold: f32,
    /// Upper IoU bound (exclusive) of the background band.
    pub bg_threshold_high: f32,
    /// Lower IoU bound (inclusive) of the background band.
    pub bg_threshold_low: f32,
    /// Fraction of the sample budget reserved for foreground proposals.
    pub fg_fraction: f32,
    /// Maximum number of sampled proposals per image.
    pub batch_size: usize,
    /// Number of categories including background at index 0.
    pub num_categories: usize,
    /// Append the ground-truth boxes to the candidate pool before matching.
    pub include_ground_truth: bool,
}

impl Default for ProposalTargetConfig {
    fn default() -> Self {
        Self {
            fg_threshold: 0.5,
            bg_threshold_high: 0.4,
            bg_threshold_low: 0.1,
            fg_fraction: 0.25,
            batch_size: 128,
            num_categories: 2,
            include_ground_truth: true,
        }
    }
}

impl ProposalTargetConfig {
    /// Validates the configuration, eagerly, before any sampling runs.
    pub fn validate(&self) -> DetGeomResult<()> {
        let finite = self.fg_threshold.is_finite()
            && self.bg_threshold_high.is_finite()
            && self.bg_threshold_low.is_finite();
        if !finite || !(0.0..=1.0).contains(&self.fg_threshold) || self.bg_threshold_low < 0.0 {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal target",
                reason: "IoU thresholds must lie in [0, 1]",
            });
        }
        if self.fg_threshold <= self.bg_threshold_high
            || self.bg_threshold_high <= self.bg_threshold_low
        {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal target",
                reason: "thresholds must satisfy fg > bg_high > bg_low",
            });
        }
        if !(self.fg_fraction > 0.0 && self.fg_fraction <= 1.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal target",
                reason: "fg_fraction must lie in (0, 1]",
            });
        }
        if self.batch_size == 0 {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal target",
                reason: "batch_size must be positive",
            });
        }
        if self.num_categories < 2 {
            return Err(DetGeomError::InvalidConfig {
                context: "proposal target",
                reason: "num_categories must include background and one category",
            });
        }
        Ok(())
    }
}

/// Sampled proposals with one-hot categories and per-category deltas.
///
/// Row `i` of `labels` is a one-hot vector of width `num_categories`
/// (background = index 0); row `i` of `deltas` has width
/// `4 * num_categories`, nonzero only in the assigned category's slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalTargets {
    pub boxes: Vec<BBox>,
    pub categories: Vec<usize>,
    pub labels: Vec<f32>,
    pub deltas: Vec<f32>,
    num_categories: usize,
}

impl ProposalTargets {
    /// Number of sampled proposals.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true when nothing was sampled.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Returns the one-hot category row for a sample.
    pub fn label_row(&self, index: usize) -> &[f32] {
        let k = self.num_categories;
        &self.labels[index * k..(index + 1) * k]
    }

    /// Returns the per-category delta row for a sample.
    pub fn delta_row(&self, index: usize) -> &[f32] {
        let k = 4 * self.num_categories;
        &self.deltas[index * k..(index + 1) * k]
    }
}

/// Samples a balanced training subset of proposals.
///
/// Zero-area proposals (padding) are dropped from the pool; ground-truth
/// boxes are appended to it when configured, so every object is represented
/// even before the first stage converges. Foreground proposals match a ground
/// truth at `fg_threshold` or above; background proposals fall in the
/// `[bg_threshold_low, bg_threshold_high)` band. At most
/// `round(fg_fraction * batch_size)` foreground and `batch_size` total rows
/// are returned — foreground first, each group in ascending pool order.
///
/// Zero-area or background-category ground-truth rows are padding and never
/// match. `gt_categories` entries must be nonzero category indices below
/// `num_categories`.
pub fn proposal_targets<R: Rng + ?Sized>(
    proposals: &[BBox],
    gt_boxes: &[BBox],
    gt_categories: &[usize],
    meta: ImageMeta,
    cfg: &ProposalTargetConfig,
    rng: &mut R,
) -> DetGeomResult<ProposalTargets> {
    cfg.validate()?;
    meta.validate()?;
    if gt_categories.len() != gt_boxes.len() {
        return Err(DetGeomError::ShapeMismatch {
            expected: gt_boxes.len(),
            got: gt_categories.len(),
            context: "ground-truth categories",
        });
    }
    for &category in gt_categories {
        if category >= cfg.num_categories {
            return Err(DetGeomError::IndexOutOfBounds {
                index: category,
                len: cfg.num_categories,
                context: "ground-truth category",
            });
        }
    }

    let _span = trace_span!("proposal_target", proposals = proposals.len()).entered();

    let mut valid_gts: Vec<BBox> = Vec::new();
    let mut valid_categories: Vec<usize> = Vec::new();
    for (gt, &category) in gt_boxes.iter().zip(gt_categories) {
        if !gt.is_empty() && category != 0 {
            valid_gts.push(*gt);
            valid_categories.push(category);
        }
    }

    let mut pool: Vec<BBox> = proposals.iter().filter(|b| !b.is_empty()).copied().collect();
    if cfg.include_ground_truth {
        pool.extend(valid_gts.iter().copied());
    }

    let matches = overlaps(&pool, &valid_gts);

    let fg: Vec<usize> = (0..pool.len())
        .filter(|&i| matches.max_iou[i] >= cfg.fg_threshold)
        .collect();
    let bg: Vec<usize> = (0..pool.len())
        .filter(|&i| {
            matches.max_iou[i] >= cfg.bg_threshold_low
                && matches.max_iou[i] < cfg.bg_threshold_high
        })
        .collect();

    let fg_budget = (cfg.fg_fraction * cfg.batch_size as f32).round() as usize;
    let fg_kept = sample_at_most(fg, fg_budget, rng);
    let bg_kept = sample_at_most(bg, cfg.batch_size - fg_kept.len(), rng);
    trace_event!(
        "proposal_target_sample",
        foreground = fg_kept.len(),
        background = bg_kept.len()
    );

    let k = cfg.num_categories;
    let total = fg_kept.len() + bg_kept.len();
    let mut boxes = Vec::with_capacity(total);
    let mut categories = Vec::with_capacity(total);
    let mut labels = vec![0.0f32; total * k];
    let mut deltas = vec![0.0f32; total * 4 * k];

    for (row, &pool_idx) in fg_kept.iter().chain(bg_kept.iter()).enumerate() {
        let foreground = row < fg_kept.len();
        let category = if foreground {
            valid_categories[matches.assigned[pool_idx]]
        } else {
            0
        };
        boxes.push(pool[pool_idx]);
        categories.push(category);
        labels[row * k + category] = 1.0;
        if foreground {
            let delta = encode(pool[pool_idx], valid_gts[matches.assigned[pool_idx]]);
            let slot = row * 4 * k + 4 * category;
            deltas[slot] = delta.dy;
            deltas[slot + 1] = delta.dx;
            deltas[slot + 2] = delta.dh;
            deltas[slot + 3] = delta.dw;
        }
    }

    Ok(ProposalTargets {
        boxes,
        categories,
        labels,
        deltas,
        num_categories: k,
    })
}

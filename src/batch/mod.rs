//! Batch-axis dispatch over per-image stage functions.
//!
//! Every stage is a pure function of one image's tensors, so the batch
//! dimension parallelizes freely: with the `rayon` feature enabled images run
//! across the thread pool, otherwise sequentially. Training stages derive an
//! independent `StdRng` per image from the caller's seed, so results do not
//! depend on scheduling order.

use crate::detect::{decode_detections, DetectionConfig, Detections};
use crate::feature::FeatureView;
use crate::geom::{BBox, BoxDelta, ImageMeta};
use crate::pool::{roi_align, PooledFeatures};
use crate::proposal::{propose, ProposalConfig, Proposals};
use crate::target::anchor::{anchor_targets, AnchorTargetConfig, AnchorTargets};
use crate::target::proposal::{proposal_targets, ProposalTargetConfig, ProposalTargets};
use crate::util::{DetGeomError, DetGeomResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
fn map_batch<U, F>(len: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    (0..len).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "rayon"))]
fn map_batch<U, F>(len: usize, f: F) -> Vec<U>
where
    F: Fn(usize) -> U,
{
    (0..len).map(f).collect()
}

fn check_batch(expected: usize, got: usize, context: &'static str) -> DetGeomResult<()> {
    if expected != got {
        return Err(DetGeomError::ShapeMismatch {
            expected,
            got,
            context,
        });
    }
    Ok(())
}

/// Derives the per-image RNG for a batch seed.
fn image_rng(seed: u64, index: usize) -> StdRng {
    // Golden-ratio mix keeps per-image streams decorrelated.
    StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Runs [`propose`] for every image in the batch.
pub fn propose_batch(
    anchors: &[BBox],
    metas: &[ImageMeta],
    deltas: &[Vec<BoxDelta>],
    scores: &[Vec<f32>],
    cfg: &ProposalConfig,
) -> DetGeomResult<Vec<Proposals>> {
    cfg.validate()?;
    check_batch(metas.len(), deltas.len(), "batch deltas")?;
    check_batch(metas.len(), scores.len(), "batch scores")?;
    map_batch(metas.len(), |i| {
        propose(anchors, metas[i], &deltas[i], &scores[i], cfg)
    })
    .into_iter()
    .collect()
}

/// Runs [`anchor_targets`] for every image in the batch.
pub fn anchor_targets_batch(
    anchors: &[BBox],
    gt_boxes: &[Vec<BBox>],
    metas: &[ImageMeta],
    cfg: &AnchorTargetConfig,
    seed: u64,
) -> DetGeomResult<Vec<AnchorTargets>> {
    cfg.validate()?;
    check_batch(metas.len(), gt_boxes.len(), "batch ground truth")?;
    map_batch(metas.len(), |i| {
        anchor_targets(anchors, &gt_boxes[i], metas[i], cfg, &mut image_rng(seed, i))
    })
    .into_iter()
    .collect()
}

/// Runs [`proposal_targets`] for every image in the batch.
pub fn proposal_targets_batch(
    proposals: &[Vec<BBox>],
    gt_boxes: &[Vec<BBox>],
    gt_categories: &[Vec<usize>],
    metas: &[ImageMeta],
    cfg: &ProposalTargetConfig,
    seed: u64,
) -> DetGeomResult<Vec<ProposalTargets>> {
    cfg.validate()?;
    check_batch(metas.len(), proposals.len(), "batch proposals")?;
    check_batch(metas.len(), gt_boxes.len(), "batch ground truth")?;
    check_batch(metas.len(), gt_categories.len(), "batch categories")?;
    map_batch(metas.len(), |i| {
        proposal_targets(
            &proposals[i],
            &gt_boxes[i],
            &gt_categories[i],
            metas[i],
            cfg,
            &mut image_rng(seed, i),
        )
    })
    .into_iter()
    .collect()
}

/// Runs [`roi_align`] for every image in the batch.
pub fn roi_align_batch(
    features: &[FeatureView<'_>],
    metas: &[ImageMeta],
    proposals: &[Vec<BBox>],
    output_height: usize,
    output_width: usize,
) -> DetGeomResult<Vec<PooledFeatures>> {
    check_batch(metas.len(), features.len(), "batch feature maps")?;
    check_batch(metas.len(), proposals.len(), "batch proposals")?;
    map_batch(metas.len(), |i| {
        roi_align(features[i], metas[i], &proposals[i], output_height, output_width)
    })
    .into_iter()
    .collect()
}

/// Runs [`decode_detections`] for every image in the batch.
pub fn decode_detections_batch(
    proposals: &[Vec<BBox>],
    deltas: &[Vec<f32>],
    scores: &[Vec<f32>],
    num_categories: usize,
    metas: &[ImageMeta],
    cfg: &DetectionConfig,
) -> DetGeomResult<Vec<Detections>> {
    cfg.validate()?;
    check_batch(metas.len(), proposals.len(), "batch proposals")?;
    check_batch(metas.len(), deltas.len(), "batch deltas")?;
    check_batch(metas.len(), scores.len(), "batch scores")?;
    map_batch(metas.len(), |i| {
        decode_detections(
            &proposals[i],
            &deltas[i],
            &scores[i],
            num_categories,
            metas[i],
            cfg,
        )
    })
    .into_iter()
    .collect()
}

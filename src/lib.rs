//! detgeom implements the non-learned geometric pipeline of a two-stage
//! region-based object detector: anchor lattices over a feature grid,
//! training-target assignment against ground truth, proposal decoding with
//! non-maximum suppression, balanced proposal sampling, region-of-interest
//! pooling, and final detection decoding.
//!
//! Every stage is a pure function over one image's numeric tensors; the
//! [`batch`] module maps them over the batch axis (in parallel with the
//! `rayon` feature). The anchor lattice is the only long-lived object and is
//! memoized per feature-grid shape by [`AnchorBank`].

pub mod anchor;
pub mod batch;
mod candidate;
pub mod detect;
pub mod feature;
pub mod geom;
pub mod pool;
pub mod proposal;
pub mod target;
mod trace;
pub mod util;

pub use anchor::{AnchorBank, AnchorConfig, AnchorLattice};
pub use candidate::nms::nms;
pub use candidate::topk::{argsort_by_score_desc, top_k_indices};
pub use detect::{decode_detections, DetectionConfig, Detections};
pub use feature::FeatureView;
pub use geom::{decode, encode, filter_by_size, iou, BBox, BoxDelta, ImageMeta};
pub use pool::{roi_align, PooledFeatures};
pub use proposal::{propose, ProposalConfig, Proposals};
pub use target::anchor::{anchor_targets, AnchorTargetConfig, AnchorTargets};
pub use target::proposal::{proposal_targets, ProposalTargetConfig, ProposalTargets};
pub use target::Label;
pub use util::{DetGeomError, DetGeomResult};

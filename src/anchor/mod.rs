//! Anchor lattice configuration and caching.
//!
//! Generating a lattice once per feature-grid shape amortizes its cost across
//! every image in a batch sharing that shape. [`AnchorBank`] memoizes
//! generated lattices behind a lock and hands them out as `Arc`s, safe to
//! share read-only across concurrent per-image tasks.

mod lattice;

pub use lattice::AnchorLattice;

use crate::util::{DetGeomError, DetGeomResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Configuration for anchor lattice generation.
///
/// Each grid cell carries `aspect_ratios.len() * scales.len()` anchor shapes
/// with `width = base_size * scale * sqrt(ratio)` and
/// `height = base_size * scale / sqrt(ratio)`, centered on the cell.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorConfig {
    /// Side length of the unit anchor in pixels.
    pub base_size: f32,
    /// Width-over-height ratios of the anchor shapes.
    pub aspect_ratios: Vec<f32>,
    /// Multiples of `base_size` for the anchor shapes.
    pub scales: Vec<f32>,
    /// Feature-grid cell spacing in image pixels.
    pub stride: f32,
    /// Extra lattice cells beyond each grid edge.
    pub padding: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            base_size: 16.0,
            aspect_ratios: vec![0.5, 1.0, 2.0],
            scales: vec![4.0, 8.0, 16.0],
            stride: 16.0,
            padding: 0,
        }
    }
}

impl AnchorConfig {
    /// Validates the configuration, eagerly, before any lattice is built.
    pub fn validate(&self) -> DetGeomResult<()> {
        if !(self.base_size.is_finite() && self.base_size > 0.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor",
                reason: "base_size must be positive and finite",
            });
        }
        if !(self.stride.is_finite() && self.stride > 0.0) {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor",
                reason: "stride must be positive and finite",
            });
        }
        if self.aspect_ratios.is_empty() {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor",
                reason: "aspect_ratios must not be empty",
            });
        }
        if self.scales.is_empty() {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor",
                reason: "scales must not be empty",
            });
        }
        if self
            .aspect_ratios
            .iter()
            .chain(self.scales.iter())
            .any(|v| !(v.is_finite() && *v > 0.0))
        {
            return Err(DetGeomError::InvalidConfig {
                context: "anchor",
                reason: "aspect_ratios and scales must be positive and finite",
            });
        }
        Ok(())
    }

    /// Number of anchor shapes per lattice cell.
    pub fn shapes_per_cell(&self) -> usize {
        self.aspect_ratios.len() * self.scales.len()
    }
}

/// Cache of anchor lattices keyed by feature-grid shape.
pub struct AnchorBank {
    cfg: AnchorConfig,
    lattices: RwLock<HashMap<(usize, usize), Arc<AnchorLattice>>>,
}

impl AnchorBank {
    /// Creates a bank, validating the configuration up front.
    pub fn new(cfg: AnchorConfig) -> DetGeomResult<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            lattices: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the bank's configuration.
    pub fn config(&self) -> &AnchorConfig {
        &self.cfg
    }

    /// Returns the lattice for a feature-grid shape, generating it on first use.
    ///
    /// Repeated calls with the same shape return the same shared allocation.
    pub fn lattice(
        &self,
        grid_height: usize,
        grid_width: usize,
    ) -> DetGeomResult<Arc<AnchorLattice>> {
        let key = (grid_height, grid_width);
        {
            let cache = self.lattices.read().expect("anchor bank lock poisoned");
            if let Some(lattice) = cache.get(&key) {
                return Ok(Arc::clone(lattice));
            }
        }

        let lattice = Arc::new(AnchorLattice::generate(&self.cfg, grid_height, grid_width)?);
        let mut cache = self.lattices.write().expect("anchor bank lock poisoned");
        Ok(Arc::clone(
            cache.entry(key).or_insert_with(|| Arc::clone(&lattice)),
        ))
    }
}

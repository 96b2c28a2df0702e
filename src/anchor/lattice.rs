//! Deterministic anchor lattice generation.

use super::AnchorConfig;
use crate::geom::BBox;
use crate::util::{DetGeomError, DetGeomResult};

/// Immutable set of anchor boxes tiled over a feature grid.
///
/// Ordering is cell-major: rows top to bottom, columns left to right within a
/// row, and the shape index (ratio-major, scale-minor) innermost. Index
/// `((row + p) * (W + 2p) + (col + p)) * K + shape` holds the anchor for grid
/// cell `(row, col)` and shape `shape`, where `p` is the configured padding.
/// Training targets and network score/delta channels are assumed aligned to
/// this ordering index-for-index.
///
/// Cell `(row, col)` is centered at `((row + 0.5) * stride, (col + 0.5) *
/// stride)`; padded cells take `row`/`col` outside `[0, H)`/`[0, W)`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorLattice {
    boxes: Vec<BBox>,
    grid_height: usize,
    grid_width: usize,
    padding: usize,
    shapes_per_cell: usize,
}

impl AnchorLattice {
    /// Generates the lattice for a feature-grid shape.
    ///
    /// Generation is deterministic: the same configuration and shape yield a
    /// bit-identical lattice, which is what makes bank caching sound.
    pub fn generate(
        cfg: &AnchorConfig,
        grid_height: usize,
        grid_width: usize,
    ) -> DetGeomResult<Self> {
        cfg.validate()?;
        if grid_height == 0 || grid_width == 0 {
            return Err(DetGeomError::InvalidDimensions {
                height: grid_height,
                width: grid_width,
                channels: cfg.shapes_per_cell(),
            });
        }

        let mut shapes = Vec::with_capacity(cfg.shapes_per_cell());
        for &ratio in &cfg.aspect_ratios {
            let root = ratio.sqrt();
            for &scale in &cfg.scales {
                let width = cfg.base_size * scale * root;
                let height = cfg.base_size * scale / root;
                shapes.push((height, width));
            }
        }

        let pad = cfg.padding as isize;
        let rows = grid_height as isize + pad;
        let cols = grid_width as isize + pad;
        let count = (grid_height + 2 * cfg.padding)
            * (grid_width + 2 * cfg.padding)
            * shapes.len();

        let mut boxes = Vec::with_capacity(count);
        for row in -pad..rows {
            let cy = (row as f32 + 0.5) * cfg.stride;
            for col in -pad..cols {
                let cx = (col as f32 + 0.5) * cfg.stride;
                for &(height, width) in &shapes {
                    boxes.push(BBox::from_center(cy, cx, height, width));
                }
            }
        }

        Ok(Self {
            boxes,
            grid_height,
            grid_width,
            padding: cfg.padding,
            shapes_per_cell: shapes.len(),
        })
    }

    /// Returns all anchor boxes in lattice order.
    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    /// Returns the number of anchors.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true if the lattice holds no anchors.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Returns the feature-grid height this lattice was generated for.
    pub fn grid_height(&self) -> usize {
        self.grid_height
    }

    /// Returns the feature-grid width this lattice was generated for.
    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    /// Returns the number of anchor shapes per cell.
    pub fn shapes_per_cell(&self) -> usize {
        self.shapes_per_cell
    }

    /// Recovers the originating `(row, col, shape)` tag for an anchor index.
    ///
    /// Padded cells yield negative rows/columns or values beyond the grid.
    pub fn tag(&self, index: usize) -> Option<(isize, isize, usize)> {
        if index >= self.boxes.len() {
            return None;
        }
        let pad = self.padding as isize;
        let cols = (self.grid_width + 2 * self.padding) as isize;
        let shape = index % self.shapes_per_cell;
        let cell = (index / self.shapes_per_cell) as isize;
        let row = cell / cols - pad;
        let col = cell % cols - pad;
        Some((row, col, shape))
    }
}

//! Budgeted subsampling with a caller-injected random source.

use rand::seq::SliceRandom;
use rand::Rng;

/// Shrinks `indices` to at most `budget` entries, returning the removed ones.
///
/// The survivors and the removed set are each restored to ascending order so
/// downstream iteration stays deterministic for a given RNG state.
pub(crate) fn sample_excess<R: Rng + ?Sized>(
    indices: &mut Vec<usize>,
    budget: usize,
    rng: &mut R,
) -> Vec<usize> {
    if indices.len() <= budget {
        return Vec::new();
    }
    indices.shuffle(rng);
    let mut removed = indices.split_off(budget);
    indices.sort_unstable();
    removed.sort_unstable();
    removed
}

/// Returns at most `budget` of `indices`, ascending.
pub(crate) fn sample_at_most<R: Rng + ?Sized>(
    mut indices: Vec<usize>,
    budget: usize,
    rng: &mut R,
) -> Vec<usize> {
    sample_excess(&mut indices, budget, rng);
    indices
}

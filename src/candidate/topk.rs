//! Deterministic score ordering shared by the pre-NMS cut and detection merge.

use std::cmp::Ordering;

/// Compares candidate indices by descending score; the lower original index
/// wins ties so downstream sampling sees a stable order.
pub(crate) fn score_cmp_desc(scores: &[f32], a: usize, b: usize) -> Ordering {
    scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b))
}

/// Returns all indices into `scores`, sorted by descending score with the
/// lower-index tie-break.
pub fn argsort_by_score_desc(scores: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| score_cmp_desc(scores, a, b));
    indices
}

/// Returns the indices of the `k` highest scores, descending.
pub fn top_k_indices(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indices = argsort_by_score_desc(scores);
    indices.truncate(k);
    indices
}

#[cfg(test)]
mod tests {
    use super::{argsort_by_score_desc, top_k_indices};

    #[test]
    fn argsort_breaks_ties_by_lower_index() {
        let scores = [0.5, 0.9, 0.5, 0.9];
        assert_eq!(argsort_by_score_desc(&scores), vec![1, 3, 0, 2]);
    }

    #[test]
    fn top_k_truncates() {
        let scores = [0.1, 0.7, 0.3];
        assert_eq!(top_k_indices(&scores, 2), vec![1, 2]);
        assert_eq!(top_k_indices(&scores, 10), vec![1, 2, 0]);
    }
}

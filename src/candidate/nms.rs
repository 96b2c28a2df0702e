//! Greedy non-maximum suppression over scored boxes.

use crate::candidate::topk::argsort_by_score_desc;
use crate::geom::{iou, BBox};
use crate::util::{DetGeomError, DetGeomResult};

/// Suppresses overlapping boxes, returning kept indices into the input.
///
/// Indices come back highest-score-first (ties broken toward the lower
/// original index) and no two kept boxes overlap above `iou_threshold`.
/// `max_output` caps the number of kept indices. Running the suppression
/// again on its own output returns it unchanged.
pub fn nms(
    boxes: &[BBox],
    scores: &[f32],
    iou_threshold: f32,
    max_output: Option<usize>,
) -> DetGeomResult<Vec<usize>> {
    if boxes.len() != scores.len() {
        return Err(DetGeomError::ShapeMismatch {
            expected: boxes.len(),
            got: scores.len(),
            context: "nms scores",
        });
    }

    let limit = max_output.unwrap_or(boxes.len());
    let mut kept: Vec<usize> = Vec::new();
    if limit == 0 {
        return Ok(kept);
    }

    'outer: for idx in argsort_by_score_desc(scores) {
        for &kept_idx in &kept {
            if iou(boxes[idx], boxes[kept_idx]) > iou_threshold {
                continue 'outer;
            }
        }
        kept.push(idx);
        if kept.len() == limit {
            break;
        }
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::nms;
    use crate::geom::BBox;

    #[test]
    fn nms_drops_heavy_overlap() {
        // IoU of these two is 0.9 and exceeds the 0.5 threshold.
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 100.0),
            BBox::new(0.0, 0.0, 10.0, 90.0),
        ];
        let scores = [0.9, 0.8];
        let kept = nms(&boxes, &scores, 0.5, None).unwrap();
        assert_eq!(kept, vec![0]);
    }

    #[test]
    fn nms_keeps_disjoint_boxes_sorted() {
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(50.0, 50.0, 60.0, 60.0),
            BBox::new(100.0, 100.0, 110.0, 110.0),
        ];
        let scores = [0.3, 0.9, 0.5];
        let kept = nms(&boxes, &scores, 0.5, None).unwrap();
        assert_eq!(kept, vec![1, 2, 0]);
    }

    #[test]
    fn nms_is_idempotent() {
        let boxes = [
            BBox::new(0.0, 0.0, 20.0, 20.0),
            BBox::new(5.0, 5.0, 25.0, 25.0),
            BBox::new(40.0, 40.0, 60.0, 60.0),
            BBox::new(41.0, 41.0, 61.0, 61.0),
        ];
        let scores = [0.9, 0.8, 0.7, 0.6];
        let kept = nms(&boxes, &scores, 0.3, None).unwrap();

        let kept_boxes: Vec<_> = kept.iter().map(|&i| boxes[i]).collect();
        let kept_scores: Vec<_> = kept.iter().map(|&i| scores[i]).collect();
        let again = nms(&kept_boxes, &kept_scores, 0.3, None).unwrap();
        assert_eq!(again, (0..kept.len()).collect::<Vec<_>>());
    }

    #[test]
    fn nms_honors_output_cap() {
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(50.0, 50.0, 60.0, 60.0),
        ];
        let scores = [0.9, 0.8];
        let kept = nms(&boxes, &scores, 0.5, Some(1)).unwrap();
        assert_eq!(kept, vec![0]);
    }
}

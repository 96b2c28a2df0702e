use detgeom::{propose, BBox, BoxDelta, ImageMeta, ProposalConfig};

fn meta() -> ImageMeta {
    ImageMeta::new(100.0, 100.0, 1.0)
}

fn zero_deltas(n: usize) -> Vec<BoxDelta> {
    vec![BoxDelta::default(); n]
}

fn small_config() -> ProposalConfig {
    ProposalConfig {
        minimum_size: 5.0,
        nms_threshold: 0.5,
        pre_nms_top_n: 10,
        post_nms_top_n: 5,
    }
}

#[test]
fn proposals_come_back_score_ordered_and_padded() {
    let anchors = [
        BBox::new(0.0, 0.0, 20.0, 20.0),
        BBox::new(40.0, 40.0, 60.0, 60.0),
        BBox::new(80.0, 80.0, 95.0, 95.0),
    ];
    let scores = [0.5, 0.9, 0.1];
    let cfg = small_config();

    let proposals = propose(&anchors, meta(), &zero_deltas(3), &scores, &cfg).unwrap();
    assert_eq!(proposals.boxes.len(), cfg.post_nms_top_n);
    assert_eq!(proposals.scores.len(), cfg.post_nms_top_n);
    assert_eq!(proposals.valid, 3);

    let first = proposals.valid_boxes()[0];
    assert!((first.y1 - 40.0).abs() < 1e-4);
    assert!((first.x2 - 60.0).abs() < 1e-4);
    assert_eq!(proposals.valid_scores(), &[0.9, 0.5, 0.1]);

    for row in proposals.valid..cfg.post_nms_top_n {
        assert!(proposals.boxes[row].is_empty());
        assert_eq!(proposals.scores[row], 0.0);
    }
}

#[test]
fn proposals_never_exceed_post_nms_top_n_and_stay_in_bounds() {
    let anchors: Vec<BBox> = (0..40)
        .map(|i| {
            let base = i as f32 * 2.5;
            BBox::new(base - 5.0, base - 5.0, base + 15.0, base + 15.0)
        })
        .collect();
    let scores: Vec<f32> = (0..40).map(|i| 1.0 - i as f32 / 40.0).collect();
    let cfg = small_config();

    let proposals = propose(&anchors, meta(), &zero_deltas(40), &scores, &cfg).unwrap();
    assert!(proposals.valid <= cfg.post_nms_top_n);
    for bbox in proposals.valid_boxes() {
        assert!(bbox.y1 >= 0.0 && bbox.x1 >= 0.0);
        assert!(bbox.y2 <= 100.0 && bbox.x2 <= 100.0);
    }
}

#[test]
fn undersized_candidates_are_dropped() {
    let anchors = [
        BBox::new(0.0, 0.0, 3.0, 3.0),
        BBox::new(20.0, 20.0, 60.0, 60.0),
    ];
    let scores = [0.9, 0.5];
    let cfg = small_config();

    let proposals = propose(&anchors, meta(), &zero_deltas(2), &scores, &cfg).unwrap();
    assert_eq!(proposals.valid, 1);
    assert!((proposals.valid_boxes()[0].y1 - 20.0).abs() < 1e-4);
}

#[test]
fn minimum_size_scales_with_image_metadata() {
    // A 12x12 box passes at scale 1 but fails once the scale doubles.
    let anchors = [BBox::new(0.0, 0.0, 12.0, 12.0)];
    let scores = [0.9];
    let cfg = ProposalConfig {
        minimum_size: 10.0,
        ..small_config()
    };

    let at_unit = propose(&anchors, meta(), &zero_deltas(1), &scores, &cfg).unwrap();
    assert_eq!(at_unit.valid, 1);

    let scaled = ImageMeta::new(100.0, 100.0, 2.0);
    let at_double = propose(&anchors, scaled, &zero_deltas(1), &scores, &cfg).unwrap();
    assert_eq!(at_double.valid, 0);
}

#[test]
fn overlapping_candidates_are_suppressed() {
    let anchors = [
        BBox::new(0.0, 0.0, 10.0, 100.0),
        BBox::new(0.0, 0.0, 10.0, 90.0),
    ];
    let scores = [0.9, 0.8];
    let cfg = small_config();

    let proposals = propose(&anchors, meta(), &zero_deltas(2), &scores, &cfg).unwrap();
    assert_eq!(proposals.valid, 1);
    assert_eq!(proposals.valid_scores(), &[0.9]);
}

#[test]
fn pre_nms_cut_bounds_the_candidate_set() {
    let anchors = [
        BBox::new(0.0, 0.0, 20.0, 20.0),
        BBox::new(40.0, 40.0, 60.0, 60.0),
        BBox::new(70.0, 70.0, 90.0, 90.0),
    ];
    let scores = [0.2, 0.9, 0.5];
    let cfg = ProposalConfig {
        pre_nms_top_n: 1,
        ..small_config()
    };

    let proposals = propose(&anchors, meta(), &zero_deltas(3), &scores, &cfg).unwrap();
    assert_eq!(proposals.valid, 1);
    assert_eq!(proposals.valid_scores(), &[0.9]);
}

#[test]
fn decoded_boxes_are_clipped_to_the_image() {
    let anchors = [BBox::new(90.0, 90.0, 120.0, 130.0)];
    let scores = [0.9];
    let cfg = small_config();

    let proposals = propose(&anchors, meta(), &zero_deltas(1), &scores, &cfg).unwrap();
    assert_eq!(proposals.valid, 1);
    let bbox = proposals.valid_boxes()[0];
    assert!((bbox.y2 - 100.0).abs() < 1e-4);
    assert!((bbox.x2 - 100.0).abs() < 1e-4);
}

#[test]
fn proposing_twice_is_deterministic() {
    let anchors: Vec<BBox> = (0..25)
        .map(|i| {
            let y = (i / 5) as f32 * 20.0;
            let x = (i % 5) as f32 * 20.0;
            BBox::new(y, x, y + 24.0, x + 24.0)
        })
        .collect();
    let scores: Vec<f32> = (0..25).map(|i| ((i * 7919) % 97) as f32 / 97.0).collect();
    let cfg = small_config();

    let a = propose(&anchors, meta(), &zero_deltas(25), &scores, &cfg).unwrap();
    let b = propose(&anchors, meta(), &zero_deltas(25), &scores, &cfg).unwrap();
    assert_eq!(a, b);
}

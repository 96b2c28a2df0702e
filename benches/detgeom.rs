use criterion::{criterion_group, criterion_main, Criterion};
use detgeom::{
    nms, propose, AnchorConfig, AnchorLattice, BBox, BoxDelta, ImageMeta, ProposalConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

fn make_boxes(count: usize, rng: &mut StdRng) -> Vec<BBox> {
    (0..count)
        .map(|_| {
            let y = rng.random_range(0.0..500.0);
            let x = rng.random_range(0.0..500.0);
            let h = rng.random_range(10.0..100.0);
            let w = rng.random_range(10.0..100.0);
            BBox::new(y, x, y + h, x + w)
        })
        .collect()
}

fn bench_lattice(c: &mut Criterion) {
    let cfg = AnchorConfig::default();
    c.bench_function("anchor_lattice_38x50", |b| {
        b.iter(|| black_box(AnchorLattice::generate(&cfg, 38, 50).unwrap()));
    });
}

fn bench_nms(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1234);
    let boxes = make_boxes(2000, &mut rng);
    let scores: Vec<f32> = (0..boxes.len()).map(|_| rng.random::<f32>()).collect();

    c.bench_function("nms_2000_boxes", |b| {
        b.iter(|| black_box(nms(&boxes, &scores, 0.7, Some(300)).unwrap()));
    });
}

fn bench_propose(c: &mut Criterion) {
    let cfg = AnchorConfig::default();
    let lattice = AnchorLattice::generate(&cfg, 38, 50).unwrap();
    let meta = ImageMeta::new(600.0, 800.0, 1.0);

    let mut rng = StdRng::seed_from_u64(5678);
    let scores: Vec<f32> = (0..lattice.len()).map(|_| rng.random::<f32>()).collect();
    let deltas: Vec<BoxDelta> = (0..lattice.len())
        .map(|_| BoxDelta {
            dy: rng.random_range(-0.2..0.2),
            dx: rng.random_range(-0.2..0.2),
            dh: rng.random_range(-0.3..0.3),
            dw: rng.random_range(-0.3..0.3),
        })
        .collect();
    let proposal_cfg = ProposalConfig::default();

    c.bench_function("propose_full_grid", |b| {
        b.iter(|| {
            black_box(propose(lattice.boxes(), meta, &deltas, &scores, &proposal_cfg).unwrap())
        });
    });
}

criterion_group!(benches, bench_lattice, bench_nms, bench_propose);
criterion_main!(benches);

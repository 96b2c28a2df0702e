use clap::Parser;
use detgeom::{
    decode_detections, propose, AnchorBank, AnchorConfig, BoxDelta, DetectionConfig, ImageMeta,
    ProposalConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "detgeom demo pipeline (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for stage profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    height: f32,
    width: f32,
    scale: f32,
}

#[derive(Debug, Deserialize)]
struct GridConfig {
    height: usize,
    width: usize,
}

#[derive(Debug, Deserialize)]
struct AnchorsConfig {
    base_size: f32,
    aspect_ratios: Vec<f32>,
    scales: Vec<f32>,
    stride: f32,
    padding: usize,
}

impl From<AnchorsConfig> for AnchorConfig {
    fn from(value: AnchorsConfig) -> Self {
        AnchorConfig {
            base_size: value.base_size,
            aspect_ratios: value.aspect_ratios,
            scales: value.scales,
            stride: value.stride,
            padding: value.padding,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProposalStageConfig {
    minimum_size: f32,
    nms_threshold: f32,
    pre_nms_top_n: usize,
    post_nms_top_n: usize,
}

impl From<ProposalStageConfig> for ProposalConfig {
    fn from(value: ProposalStageConfig) -> Self {
        ProposalConfig {
            minimum_size: value.minimum_size,
            nms_threshold: value.nms_threshold,
            pre_nms_top_n: value.pre_nms_top_n,
            post_nms_top_n: value.post_nms_top_n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectionStageConfig {
    score_threshold: f32,
    nms_threshold: f32,
    max_detections: usize,
}

impl From<DetectionStageConfig> for DetectionConfig {
    fn from(value: DetectionStageConfig) -> Self {
        DetectionConfig {
            score_threshold: value.score_threshold,
            nms_threshold: value.nms_threshold,
            max_detections: value.max_detections,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Config {
    image: ImageConfig,
    grid: GridConfig,
    anchors: AnchorsConfig,
    proposal: ProposalStageConfig,
    detection: DetectionStageConfig,
    num_categories: usize,
    seed: u64,
}

#[derive(Debug, Serialize)]
struct DetectionReport {
    y1: f32,
    x1: f32,
    y2: f32,
    x2: f32,
    category: usize,
    score: f32,
}

#[derive(Debug, Serialize)]
struct Report {
    anchors: usize,
    proposals: usize,
    detections: Vec<DetectionReport>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    let raw = fs::read_to_string(&cli.config)
        .map_err(|e| format!("cannot read {}: {e}", cli.config.display()))?;
    let config: Config = serde_json::from_str(&raw)?;

    let meta = ImageMeta::new(config.image.height, config.image.width, config.image.scale);
    let bank = AnchorBank::new(config.anchors.into())?;
    let lattice = bank.lattice(config.grid.height, config.grid.width)?;

    // Fabricated first-stage outputs stand in for the network so the
    // geometric pipeline can be exercised and profiled on its own.
    let mut rng = StdRng::seed_from_u64(config.seed);
    let scores: Vec<f32> = (0..lattice.len()).map(|_| rng.random::<f32>()).collect();
    let deltas: Vec<BoxDelta> = (0..lattice.len())
        .map(|_| BoxDelta {
            dy: rng.random_range(-0.2..0.2),
            dx: rng.random_range(-0.2..0.2),
            dh: rng.random_range(-0.3..0.3),
            dw: rng.random_range(-0.3..0.3),
        })
        .collect();

    let proposal_cfg: ProposalConfig = config.proposal.into();
    let proposals = propose(lattice.boxes(), meta, &deltas, &scores, &proposal_cfg)?;

    let k = config.num_categories;
    let p = proposals.boxes.len();
    let class_scores: Vec<f32> = (0..p * k).map(|_| rng.random::<f32>() / k as f32).collect();
    let class_deltas: Vec<f32> = (0..p * 4 * k).map(|_| rng.random_range(-0.1..0.1)).collect();

    let detection_cfg: DetectionConfig = config.detection.into();
    let detections = decode_detections(
        &proposals.boxes,
        &class_deltas,
        &class_scores,
        k,
        meta,
        &detection_cfg,
    )?;

    let report = Report {
        anchors: lattice.len(),
        proposals: proposals.valid,
        detections: detections
            .valid_boxes()
            .iter()
            .zip(detections.valid_categories())
            .zip(detections.valid_scores())
            .map(|((bbox, &category), &score)| DetectionReport {
                y1: bbox.y1,
                x1: bbox.x1,
                y2: bbox.y2,
                x2: bbox.x2,
                category,
                score,
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

use clap::Parser;
use multibox::{Detection, DetectorConfig, MultiboxDetector, MultiboxInput};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Multibox detection post-processing (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct DetectorConfigJson {
    nms_top_k: i32,
    keep_top_k: i32,
    nms_thresh: f32,
    conf_thresh: f32,
    background_label: i32,
    parallel: bool,
}

impl Default for DetectorConfigJson {
    fn default() -> Self {
        let cfg = DetectorConfig::default();
        Self {
            nms_top_k: to_raw(cfg.nms_top_k),
            keep_top_k: to_raw(cfg.keep_top_k),
            nms_thresh: cfg.nms_thresh,
            conf_thresh: cfg.conf_thresh,
            background_label: to_raw(cfg.background_label),
            parallel: cfg.parallel,
        }
    }
}

impl From<&DetectorConfigJson> for DetectorConfig {
    fn from(value: &DetectorConfigJson) -> Self {
        DetectorConfig {
            parallel: value.parallel,
            ..DetectorConfig::from_raw(
                value.nms_top_k,
                value.keep_top_k,
                value.nms_thresh,
                value.conf_thresh,
                value.background_label,
            )
        }
    }
}

fn to_raw(value: Option<usize>) -> i32 {
    value
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(-1)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    input_path: String,
    output_path: Option<String>,
    detector: DetectorConfigJson,
}

#[derive(Debug, Deserialize)]
struct Predictions {
    batch_size: usize,
    num_priors: usize,
    num_classes: usize,
    locations: Vec<f32>,
    confidences: Vec<f32>,
    priors: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    label: usize,
    score: f32,
    bbox: [f32; 4],
    anchor: usize,
}

impl From<Detection> for DetectionRecord {
    fn from(value: Detection) -> Self {
        Self {
            label: value.label(),
            score: value.score,
            bbox: value.bbox.to_array(),
            anchor: value.anchor_index,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    images: Vec<Vec<DetectionRecord>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("multibox=debug".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.input_path.is_empty() {
        return Err("input_path must be set in the config".into());
    }

    let predictions: Predictions = serde_json::from_str(&fs::read_to_string(&config.input_path)?)?;
    let input = MultiboxInput::new(
        &predictions.locations,
        &predictions.confidences,
        &predictions.priors,
        predictions.batch_size,
        predictions.num_priors,
        predictions.num_classes,
    )?;

    let detector = MultiboxDetector::new().with_config(DetectorConfig::from(&config.detector));
    let images = detector
        .detect(&input)?
        .into_iter()
        .map(|dets| dets.into_iter().map(DetectionRecord::from).collect())
        .collect();
    let json = serde_json::to_string_pretty(&Output { images })?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}

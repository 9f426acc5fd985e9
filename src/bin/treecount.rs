//! treecount - upload an image for detection and count unique objects.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};

use treecount::cluster::cluster_count;
use treecount::config::TreecountConfig;
use treecount::inference::{parse_predictions, InferenceClient};
use treecount::overlay;
use treecount::BoundingBox;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Count unique objects in an image by clustering detection bounding boxes"
)]
struct Args {
    /// Proximity threshold in pixels; overrides the configured value.
    #[arg(long)]
    threshold: Option<f64>,

    /// Emit machine-readable JSON instead of a summary line.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an image, cluster the detections, and write an annotated copy.
    Process {
        /// Image file to upload.
        image: PathBuf,

        /// Output path for the annotated image (default: <stem>.annotated.png).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Skip writing the annotated image.
        #[arg(long)]
        no_overlay: bool,
    },
    /// Count clusters in a saved detection response.
    Count {
        /// Path to a JSON response body; reads stdin when omitted.
        #[arg(long)]
        detections: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = TreecountConfig::load()?;
    let threshold = args.threshold.unwrap_or(cfg.threshold);

    match args.command {
        Command::Process {
            image,
            out,
            no_overlay,
        } => process(&cfg, threshold, &image, out, no_overlay, args.json),
        Command::Count { detections } => count(threshold, detections.as_deref(), args.json),
    }
}

fn process(
    cfg: &TreecountConfig,
    threshold: f64,
    image: &Path,
    out: Option<PathBuf>,
    no_overlay: bool,
    json: bool,
) -> Result<()> {
    let client = InferenceClient::new(&cfg.endpoint, cfg.timeout)?
        .with_upload_field(&cfg.upload_field)
        .with_max_upload_bytes(cfg.max_upload_bytes);

    log::info!("Uploading {} to {}", image.display(), cfg.endpoint);
    let boxes = client.detect(image)?;
    log::info!("Endpoint returned {} detections", boxes.len());

    let count = cluster_count(&boxes, threshold);

    if !no_overlay {
        let out = out.unwrap_or_else(|| default_out_path(image));
        overlay::annotate(image, &boxes, &out)?;
        log::info!("Annotated image written to {}", out.display());
    }

    report(count, &boxes, json);
    Ok(())
}

fn count(threshold: f64, detections: Option<&Path>, json: bool) -> Result<()> {
    let body = match detections {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read detections file {}", path.display()))?,
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("read detections from stdin")?;
            body
        }
    };

    let boxes = parse_predictions(&body)?;
    let count = cluster_count(&boxes, threshold);
    report(count, &boxes, json);
    Ok(())
}

fn report(count: usize, boxes: &[BoundingBox], json: bool) {
    if json {
        let doc = serde_json::json!({
            "count": count,
            "detections": boxes,
        });
        println!("{}", doc);
    } else {
        println!("{} unique objects ({} detections)", count, boxes.len());
    }
}

fn default_out_path(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    image.with_file_name(format!("{}.annotated.png", stem))
}

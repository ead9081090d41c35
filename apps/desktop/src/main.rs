use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    controller::{RenderedResults, SaturationSlider},
    run_submission, FormController, HttpProcessingClient, SelectedFile, UiMessage,
};
use grain_analysis::{
    analyze_bytes, histogram_png, millimetres_per_pixel, report_pngs, AnalysisParams,
};
use serde::Serialize;
use shared::{domain::Algorithm, protocol::strip_png_data_uri};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Parser, Debug)]
#[command(name = "grainscope", about = "Measure sediment grains in photographs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one image to the processing service and print the summary.
    Process(ProcessArgs),
    /// Analyse every image in a directory locally, one JSON line per file.
    Batch(BatchArgs),
    /// Millimetres per pixel from two points a known distance apart.
    Calibrate(CalibrateArgs),
}

#[derive(ClapArgs, Debug)]
struct ProcessArgs {
    image: PathBuf,
    #[arg(long, default_value = "coloralg")]
    algorithm: Algorithm,
    /// Slider position, 0 to 100.
    #[arg(
        long,
        default_value_t = SaturationSlider::MAX,
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    saturation: u8,
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    server_url: Url,
    /// Directory to write the four result images to.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct BatchArgs {
    dir: PathBuf,
    #[arg(long, default_value = "contouralg")]
    algorithm: Algorithm,
    #[arg(
        long,
        default_value_t = SaturationSlider::MAX,
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    saturation: u8,
    #[arg(long)]
    max_length_mm: Option<f64>,
    #[arg(long)]
    calibration_factor: Option<f64>,
    /// Only files whose name starts with this prefix.
    #[arg(long)]
    prefix: Option<String>,
    /// Directory for result images, `results.jsonl` and `combined_histogram.png`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct CalibrateArgs {
    #[arg(long, value_parser = parse_point)]
    from: (f64, f64),
    #[arg(long, value_parser = parse_point)]
    to: (f64, f64),
    #[arg(long)]
    distance_mm: f64,
}

#[derive(Debug, Serialize)]
struct BatchRecord {
    file: String,
    average: f64,
    count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    match args.command {
        Command::Process(args) => process(args).await,
        Command::Batch(args) => tokio::task::spawn_blocking(move || batch(args)).await?,
        Command::Calibrate(args) => {
            let factor = millimetres_per_pixel(args.from, args.to, args.distance_mm)?;
            println!("Calibration factor: {factor} mm/pixel");
            Ok(())
        }
    }
}

async fn process(args: ProcessArgs) -> Result<()> {
    let file = SelectedFile::read(&args.image)
        .with_context(|| format!("failed to read '{}'", args.image.display()))?;
    let client = HttpProcessingClient::new(&args.server_url)
        .with_context(|| format!("invalid server url '{}'", args.server_url))?;

    let mut controller = FormController::with_saturation(args.saturation);
    controller.dispatch(UiMessage::TabSelected(args.algorithm.tab()));
    controller.dispatch(UiMessage::FilesChanged(vec![file]));
    run_submission(&mut controller, &client).await;

    if let Some(alert) = controller.alert() {
        bail!(alert.message());
    }
    let content = controller
        .results_panel(args.algorithm)
        .content()
        .context("service returned no results")?;
    for line in content.summary_lines() {
        println!("{line}");
    }

    if let Some(out) = &args.out {
        let stem = file_stem(&args.image);
        write_rendered_images(out, &stem, content)?;
        info!(dir = %out.display(), "wrote result images");
    }
    Ok(())
}

fn write_rendered_images(out: &Path, stem: &str, content: &RenderedResults) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("failed to create '{}'", out.display()))?;
    for image in &content.images {
        let b64 = strip_png_data_uri(&image.src).context("result image is not a png data uri")?;
        let bytes = STANDARD
            .decode(b64)
            .with_context(|| format!("invalid base64 in {}", image.kind.field_name()))?;
        let path = out.join(format!("{stem}_{}.png", image.kind.field_name()));
        fs::write(&path, bytes).with_context(|| format!("failed to write '{}'", path.display()))?;
    }
    Ok(())
}

fn batch(args: BatchArgs) -> Result<()> {
    let mut params = AnalysisParams::default();
    if let Some(v) = args.max_length_mm {
        params.max_length_mm = v;
    }
    if let Some(v) = args.calibration_factor {
        params.calibration_factor = v;
    }
    let saturation = f64::from(args.saturation) / 100.0;

    let files = image_files(&args.dir, args.prefix.as_deref())?;
    info!(dir = %args.dir.display(), files = files.len(), algorithm = %args.algorithm, "batch started");

    let mut results = match &args.out {
        Some(out) => {
            fs::create_dir_all(out)
                .with_context(|| format!("failed to create '{}'", out.display()))?;
            Some(fs::File::create(out.join("results.jsonl")).context("failed to create results.jsonl")?)
        }
        None => None,
    };

    let mut pooled_lengths = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
        let report = match analyze_bytes(args.algorithm, &bytes, &params, saturation) {
            Ok(report) => report,
            Err(error) => {
                warn!(file = %name, %error, "skipping image");
                continue;
            }
        };

        let record = BatchRecord {
            file: name,
            average: report.average_length(),
            count: report.grain_count(),
        };
        let line = serde_json::to_string(&record)?;
        println!("{line}");
        pooled_lengths.extend(report.lengths_mm());

        if let (Some(out), Some(results)) = (&args.out, results.as_mut()) {
            writeln!(results, "{line}")?;
            let stem = file_stem(&path);
            let pngs = report_pngs(&report)?;
            for (kind, png) in shared::domain::ImageKind::ORDER.iter().zip(pngs) {
                fs::write(out.join(format!("{stem}_{}.png", kind.field_name())), png)?;
            }
        }
    }

    if let Some(out) = &args.out {
        let path = write_combined_histogram(out, &pooled_lengths, params.histogram_bins)?;
        info!(path = %path.display(), grains = pooled_lengths.len(), "wrote combined histogram");
    }
    Ok(())
}

/// Size distribution of every grain kept across the batch.
fn write_combined_histogram(out: &Path, lengths_mm: &[f64], bins: usize) -> Result<PathBuf> {
    let png = histogram_png(lengths_mm, bins)?;
    let path = out.join("combined_histogram.png");
    fs::write(&path, png).with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(path)
}

fn image_files(dir: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list '{}'", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() || !is_image_file(&path) {
            continue;
        }
        let matches_prefix = match (prefix, path.file_name()) {
            (Some(prefix), Some(name)) => name.to_string_lossy().starts_with(prefix),
            (Some(_), None) => false,
            (None, _) => true,
        };
        if matches_prefix {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn parse_point(raw: &str) -> Result<(f64, f64), String> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{raw}'"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points() {
        assert_eq!(parse_point("12, 40.5"), Ok((12.0, 40.5)));
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,1").is_err());
    }

    #[test]
    fn recognises_image_extensions() {
        assert!(is_image_file(Path::new("233_a.JPG")));
        assert!(is_image_file(Path::new("x.png")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("README")));
    }

    #[test]
    fn parses_process_arguments() {
        let args = Args::try_parse_from([
            "grainscope",
            "process",
            "grains.png",
            "--algorithm",
            "contouralg",
            "--saturation",
            "40",
        ])
        .expect("args");
        let Command::Process(process) = args.command else {
            panic!("expected process command");
        };
        assert_eq!(process.algorithm, Algorithm::ContourAlg);
        assert_eq!(process.saturation, 40);
        assert_eq!(process.server_url.as_str(), "http://127.0.0.1:5000/");

        assert!(Args::try_parse_from(["grainscope", "process", "a.png", "--saturation", "101"]).is_err());
        assert!(Args::try_parse_from(["grainscope", "process", "a.png", "--algorithm", "sobel"]).is_err());
    }

    #[test]
    fn batch_lists_matching_images_sorted() {
        let dir = std::env::temp_dir().join(format!("grainscope_batch_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        for name in ["233_b.png", "233_a.jpg", "100_c.png", "notes.txt"] {
            fs::write(dir.join(name), b"x").expect("write");
        }

        let all = image_files(&dir, None).expect("list");
        assert_eq!(all.len(), 3);
        let filtered = image_files(&dir, Some("233")).expect("list");
        let names: Vec<_> = filtered
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["233_a.jpg", "233_b.png"]);

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn combined_histogram_is_written_as_png() {
        let dir = std::env::temp_dir().join(format!("grainscope_combined_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");

        let path = write_combined_histogram(&dir, &[0.1, 0.12, 0.3, 0.31, 0.5], 60).expect("write");
        assert_eq!(path, dir.join("combined_histogram.png"));
        let bytes = fs::read(&path).expect("read");
        assert!(bytes.starts_with(b"\x89PNG"));

        fs::remove_dir_all(dir).expect("cleanup");
    }
}

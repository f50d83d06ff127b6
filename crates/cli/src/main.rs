//! tilestats CLI - land-cover tile statistics

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tilestats_algorithms::landcover::{class_proportions, ClassProportionsParams, ProportionHistogram};
use tilestats_algorithms::statistics::{band_statistics, BandStatisticsParams, BandSummary};
use tilestats_core::io::{band_count, read_geotiff, read_lookup_table};
use tilestats_core::{LookupTable, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "tilestats")]
#[command(author, version, about = "Land-cover tile statistics", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a tile
    Info {
        /// Input tile
        input: PathBuf,
        /// Band number (1-based)
        #[arg(short, long, default_value = "1")]
        band: usize,
    },
    /// Per-class pixel proportions of land-cover tiles
    Proportions {
        /// Input tiles
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Lookup table mapping class codes to names
        #[arg(short, long)]
        lut: PathBuf,
        /// Band number (1-based)
        #[arg(short, long, default_value = "1")]
        band: usize,
        /// Decimal places for proportions
        #[arg(short, long, default_value = "2")]
        decimals: u32,
        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Band descriptive statistics (mean, median, range, min, max, CV)
    Stats {
        /// Input tiles
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Band number (1-based)
        #[arg(short, long, default_value = "1")]
        band: usize,
        /// Fail instead of computing missing STATISTICS_* items from pixels
        #[arg(long)]
        no_fallback: bool,
        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct TileReport<'a, R: Serialize> {
    tile: &'a Path,
    band: usize,
    #[serde(flatten)]
    result: &'a R,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress(len: usize, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:30.green}] {pos}/{len} ({elapsed})")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb
}

fn parse_format(s: &str) -> Result<OutputFormat> {
    match s.to_lowercase().as_str() {
        "text" | "txt" | "t" => Ok(OutputFormat::Text),
        "json" | "j" => Ok(OutputFormat::Json),
        _ => anyhow::bail!("Unknown format: {}. Use text or json.", s),
    }
}

fn read_band(path: &Path, band: usize) -> Result<Raster<f64>> {
    let raster: Raster<f64> = read_geotiff(path, Some(band))
        .with_context(|| format!("Failed to read band {} of {}", band, path.display()))?;
    Ok(raster)
}

/// Run `job` over every tile in parallel, keeping input order
fn process_tiles<T, F>(inputs: &[PathBuf], msg: &str, job: F) -> Vec<(PathBuf, Result<T>)>
where
    T: Send,
    F: Fn(&Path) -> Result<T> + Sync,
{
    let pb = progress(inputs.len(), msg);
    let results: Vec<(PathBuf, Result<T>)> = inputs
        .par_iter()
        .map(|path| {
            let result = job(path.as_path());
            pb.inc(1);
            (path.clone(), result)
        })
        .collect();
    pb.finish_and_clear();
    results
}

/// Print successes, log failures, and fail if any tile failed
fn report<T, F>(results: Vec<(PathBuf, Result<T>)>, band: usize, format: OutputFormat, print_text: F) -> Result<()>
where
    T: Serialize,
    F: Fn(&Path, &T),
{
    let total = results.len();
    let mut failed = 0;

    for (path, result) in &results {
        match result {
            Ok(value) => match format {
                OutputFormat::Text => print_text(path.as_path(), value),
                OutputFormat::Json => {
                    let report = TileReport {
                        tile: path.as_path(),
                        band,
                        result: value,
                    };
                    println!("{}", serde_json::to_string(&report)?);
                }
            },
            Err(e) => {
                failed += 1;
                error!("{}: {:#}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} tile(s) failed", failed, total);
    }
    Ok(())
}

fn print_proportions(path: &Path, band: usize, result: &ProportionHistogram) {
    println!("Tile: {} (band {})", path.display(), band);
    println!(
        "  Valid pixels: {} of {} ({} NoData)",
        result.valid_pixels, result.total_pixels, result.nodata_pixels
    );
    println!("  {:>5}  {:>10}  {:>8}  Class", "Code", "Proportion", "Pixels");
    for class in &result.classes {
        println!(
            "  {:>5}  {:>10}  {:>8}  {}",
            class.code,
            class.proportion,
            class.count,
            class.name.as_deref().unwrap_or("-")
        );
    }
}

fn print_statistics(path: &Path, band: usize, stats: &BandSummary) {
    let opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| v.to_string());

    println!("Tile: {} (band {})", path.display(), band);
    println!("  Mean:    {}", stats.mean);
    println!("  Median:  {}", opt(stats.median));
    println!("  Range:   {}", stats.range);
    println!("  Maximum: {}", stats.maximum);
    println!("  Minimum: {}", stats.minimum);
    println!("  CV (%):  {}", opt(stats.coefficient_of_variation));
    println!("  Source:  {:?} ({} valid pixels)", stats.source, stats.valid_count);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input, band } => {
            let pb = spinner("Reading tile...");
            let bands = band_count(&input).context("Failed to open tile")?;
            let raster = read_band(&input, band)?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Bands: {}", bands);
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            if !raster.tags().is_empty() {
                println!("\nBand {} metadata:", band);
                for (key, value) in raster.tags().iter() {
                    println!("  {}={}", key, value);
                }
            }
            println!("\nPixel statistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if let Some(std_dev) = stats.std_dev {
                println!("  Std dev: {:.4}", std_dev);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Proportions ──────────────────────────────────────────────
        Commands::Proportions {
            inputs,
            lut,
            band,
            decimals,
            format,
        } => {
            let format = parse_format(&format)?;
            let table: LookupTable = read_lookup_table(&lut)
                .with_context(|| format!("Failed to read lookup table {}", lut.display()))?;
            info!("Lookup table: {} classes", table.len());

            let start = Instant::now();
            let results = process_tiles(&inputs, "Counting classes", |path| {
                let raster = read_band(path, band)?;
                let params = ClassProportionsParams {
                    decimals: Some(decimals),
                };
                class_proportions(&raster, &table, params)
                    .with_context(|| format!("Failed to count classes in {}", path.display()))
            });
            info!("Processed {} tile(s) in {:.2?}", inputs.len(), start.elapsed());

            report(results, band, format, |path, result| {
                print_proportions(path, band, result)
            })?;
        }

        // ── Stats ────────────────────────────────────────────────────
        Commands::Stats {
            inputs,
            band,
            no_fallback,
            format,
        } => {
            let format = parse_format(&format)?;
            let params = BandStatisticsParams {
                fallback_to_pixels: !no_fallback,
            };

            let start = Instant::now();
            let results = process_tiles(&inputs, "Computing statistics", |path| {
                let raster = read_band(path, band)?;
                band_statistics(&raster, params.clone())
                    .with_context(|| format!("Failed to compute statistics for {}", path.display()))
            });
            info!("Processed {} tile(s) in {:.2?}", inputs.len(), start.elapsed());

            report(results, band, format, |path, stats| {
                print_statistics(path, band, stats)
            })?;
        }
    }

    Ok(())
}

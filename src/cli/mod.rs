//! Command-line interface for the georeferencing pipeline.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::capture::CaptureFormat;
use crate::core::transforms::AngleUnit;
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "georef-pipeline")]
#[command(about = "Aerial image georeferencing from camera logs and SBET trajectories", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the image metadata CSV for a basin
    CreateCsv {
        /// Basin directory with the camera logs and SBET folder
        #[arg(long)]
        base_path: Option<PathBuf>,
        /// Capture logs use the legacy (time + file) layout
        #[arg(long)]
        old_eif_type: bool,
        /// Look up navigation in the SBET even if the logs carry it
        #[arg(long)]
        query_sbet: bool,
        /// Image type written to the Filename column
        #[arg(long)]
        image_type: Option<String>,
        /// GPS - UTC leap seconds
        #[arg(long)]
        leap_seconds: Option<f64>,
        /// Half width of the time match window in seconds
        #[arg(long)]
        window: Option<f64>,
        /// Output file name, written to the base path
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Convert a binary SBET file into a trajectory CSV
    ExtractSbet {
        /// Binary SBET file
        input: PathBuf,
        /// Output directory for sbet.csv (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Write angles in degrees instead of radians
        #[arg(long)]
        degrees: bool,
    },

    /// Move images inside a boundary to a keep/ folder
    FilterImages {
        /// Directory containing the images
        #[arg(long)]
        images_path: PathBuf,
        /// Metadata CSV listing the images
        #[arg(long)]
        csv: PathBuf,
        /// Boundary in GeoJSON format
        #[arg(long)]
        boundary: Option<PathBuf>,
        /// Preview changes without moving files
        #[arg(long)]
        dry_run: bool,
    },

    /// Write the effective configuration as YAML
    WriteConfig {
        /// Destination YAML file
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let tail: String = value.chars().rev().take(36).collect::<Vec<_>>().into_iter().rev().collect();
            format!("...{}", tail)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config; a file that was asked for but cannot be used is fatal
    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::CreateCsv {
            base_path,
            old_eif_type,
            query_sbet,
            image_type,
            leap_seconds,
            window,
            output,
        } => {
            let overrides = CreateCsvOverrides {
                old_eif_type,
                query_sbet,
                image_type,
                leap_seconds,
                window,
                output,
            };
            cmd_create_csv(base_path, overrides, config);
        }
        Commands::ExtractSbet { input, output_dir, degrees } => {
            cmd_extract_sbet(&input, output_dir, degrees, &config);
        }
        Commands::FilterImages { images_path, csv, boundary, dry_run } => {
            cmd_filter_images(&images_path, &csv, boundary.as_deref(), dry_run);
        }
        Commands::WriteConfig { path } => {
            if let Err(e) = cmd_write_config(&path, &config) {
                error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Load the YAML config at `path`, or the defaults when none is given.
fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .map_err(|e| anyhow!("{}", e))
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Command line values that take precedence over the config file.
struct CreateCsvOverrides {
    old_eif_type: bool,
    query_sbet: bool,
    image_type: Option<String>,
    leap_seconds: Option<f64>,
    window: Option<f64>,
    output: Option<String>,
}

impl CreateCsvOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        if self.old_eif_type {
            config.capture.format = CaptureFormat::Legacy;
        }
        if self.query_sbet {
            config.capture.force_query = true;
        }
        if let Some(image_type) = self.image_type {
            config.capture.image_type = image_type;
        }
        if let Some(leap_seconds) = self.leap_seconds {
            config.time.leap_seconds = leap_seconds;
        }
        if let Some(window) = self.window {
            config.matching.window_s = window;
        }
        if let Some(output) = self.output {
            config.paths.output_file = output;
        }
    }
}

fn resolve_base_path(arg: Option<PathBuf>, config: &PipelineConfig) -> anyhow::Result<PathBuf> {
    let base = arg
        .or_else(|| config.paths.base_path.clone())
        .context("no base path given (use --base-path or paths.base_path in the config)")?;
    if !base.is_dir() {
        bail!("base path {} is not a directory", base.display());
    }
    Ok(base)
}

fn cmd_create_csv(base_path: Option<PathBuf>, overrides: CreateCsvOverrides, mut config: PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();
    overrides.apply(&mut config);

    let base = match resolve_base_path(base_path, &config) {
        Ok(base) => base,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    println!("Creating image metadata CSV...");
    println!("Base path: {}", base.display());
    println!("Capture format: {:?}", config.capture.format);
    println!("Trajectory lookup: {}", config.requires_trajectory());

    let spinner = create_spinner("Matching capture records...");

    match pipeline::run(&config, &base) {
        Ok(summary) => {
            spinner.finish_and_clear();

            if summary.unmatched > 0 {
                warn!("{} images have no trajectory match", summary.unmatched);
            }

            print_summary(
                "Image Metadata CSV Complete",
                &[
                    ("Base path", base.display().to_string()),
                    ("Output file", summary.output.display().to_string()),
                    ("Images", summary.total.to_string()),
                    ("Inline navigation", summary.inline.to_string()),
                    ("Matched", summary.matched.to_string()),
                    ("Unmatched", summary.unmatched.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Creating CSV failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_extract_sbet(input: &Path, output_dir: Option<PathBuf>, degrees: bool, config: &PipelineConfig) {
    use crate::processors::pipeline;

    let start = Instant::now();

    let output_dir = output_dir.unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let output = output_dir.join(&config.paths.sbet_file);
    let unit = if degrees { AngleUnit::Degrees } else { AngleUnit::Radians };

    println!("Extracting SBET...");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());
    println!("Angle unit: {:?}", unit);

    let spinner = create_spinner("Reading SBET records...");

    match pipeline::extract_sbet(input, &output, unit) {
        Ok(count) => {
            spinner.finish_and_clear();

            print_summary(
                "SBET Extraction Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output file", output.display().to_string()),
                    ("Records", count.to_string()),
                    ("Angle unit", format!("{:?}", unit)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("SBET extraction failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_filter_images(images_path: &Path, csv: &Path, boundary: Option<&Path>, dry_run: bool) {
    use crate::processors::filtering;

    let start = Instant::now();

    if dry_run {
        println!("DRY RUN: No files will be moved");
    }

    let spinner = create_spinner("Selecting images...");

    match filtering::filter_images(images_path, csv, boundary, dry_run) {
        Ok(summary) => {
            spinner.finish_and_clear();

            for missing in &summary.missing {
                println!("Missing file {} from csv", missing.display());
            }

            print_summary(
                "Filter Images Complete",
                &[
                    ("Images path", images_path.display().to_string()),
                    (
                        "Boundary",
                        boundary.map_or_else(|| "none".to_string(), |b| b.display().to_string()),
                    ),
                    ("Moved", summary.moved.len().to_string()),
                    ("Outside boundary", summary.outside.to_string()),
                    ("Missing", summary.missing.len().to_string()),
                    ("Dry run", dry_run.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Filtering images failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_write_config(path: &Path, config: &PipelineConfig) -> anyhow::Result<()> {
    config
        .to_yaml(path)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("writing config to {}", path.display()))?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_create_csv() {
        let cli = Cli::try_parse_from([
            "georef-pipeline",
            "-vv",
            "create-csv",
            "--base-path",
            "/data/basin",
            "--old-eif-type",
            "--leap-seconds",
            "17",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::CreateCsv {
                base_path,
                old_eif_type,
                leap_seconds,
                query_sbet,
                ..
            } => {
                assert_eq!(base_path, Some(PathBuf::from("/data/basin")));
                assert!(old_eif_type);
                assert!(!query_sbet);
                assert_eq!(leap_seconds, Some(17.0));
            }
            _ => panic!("Expected create-csv"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = PipelineConfig::default();
        CreateCsvOverrides {
            old_eif_type: true,
            query_sbet: false,
            image_type: Some("jpg".to_string()),
            leap_seconds: None,
            window: Some(0.02),
            output: None,
        }
        .apply(&mut config);

        assert_eq!(config.capture.format, CaptureFormat::Legacy);
        assert!(!config.capture.force_query);
        assert_eq!(config.capture.image_type, "jpg");
        assert_eq!(config.time.leap_seconds, 18.0);
        assert_eq!(config.matching.window_s, 0.02);
        assert_eq!(config.paths.output_file, "images_metadata.csv");
    }

    #[test]
    fn test_load_config_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();

        let typo = dir.path().join("typo.yaml");
        std::fs::write(&typo, "capture:\n  format: legacy\ntime:\n  leap_seconds: 19s\n").unwrap();
        assert!(load_config(Some(&typo)).is_err());

        let unknown = dir.path().join("unknown.yaml");
        std::fs::write(&unknown, "time:\n  leap_secs: 19\n").unwrap();
        assert!(load_config(Some(&unknown)).is_err());

        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_load_config_reads_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("georef.yaml");
        std::fs::write(&path, "capture:\n  format: legacy\ntime:\n  leap_seconds: 19\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.capture.format, CaptureFormat::Legacy);
        assert_eq!(config.time.leap_seconds, 19.0);

        let defaults = load_config(None).unwrap();
        assert_eq!(defaults.time.leap_seconds, 18.0);
    }

    #[test]
    fn test_resolve_base_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default();

        assert!(resolve_base_path(None, &config).is_err());
        assert!(resolve_base_path(Some(dir.path().join("missing")), &config).is_err());
        assert_eq!(
            resolve_base_path(Some(dir.path().to_path_buf()), &config).unwrap(),
            dir.path()
        );
    }

    #[test]
    fn test_write_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("georef.yaml");

        cmd_write_config(&path, &PipelineConfig::default()).unwrap();

        let loaded = PipelineConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.paths.image_dir, "camera");
    }
}

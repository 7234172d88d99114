//! End-to-end metadata CSV creation for one basin directory.
//!
//! Every input is read and validated before anything is written: a missing
//! or malformed capture log or trajectory aborts the run with no output file.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::core::capture::{parse_capture_logs, CaptureError, CaptureFormat, CaptureOptions, CaptureRecord};
use crate::core::loaders::{load_trajectory_csv, read_sbet_binary, LoaderError, TrajectoryTable, TrajectoryUnits};
use crate::core::transforms::AngleUnit;
use crate::core::writers::{write_metadata_csv, write_trajectory_csv, OutputRow, WriteError};
use crate::processors::assembler::assemble;
use crate::processors::epoch::EpochReconciler;
use crate::processors::matching::{match_all, MatchResult};

/// Errors that abort a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Counts reported after a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Rows written.
    pub total: usize,
    /// Rows built from inline navigation.
    pub inline: usize,
    /// Rows matched against the trajectory.
    pub matched: usize,
    /// Rows left without navigation.
    pub unmatched: usize,
    pub output: PathBuf,
}

fn trajectory_units(config: &PipelineConfig) -> TrajectoryUnits {
    TrajectoryUnits {
        position: config.trajectory.position_unit,
        attitude: config.trajectory.attitude_unit,
    }
}

fn inline_rows(records: &[CaptureRecord], config: &PipelineConfig) -> Vec<OutputRow> {
    records
        .iter()
        .map(|record| match &record.navigation {
            Some(nav) => OutputRow::from_inline(
                record,
                nav,
                config.extended.yaw_convention,
                config.extended.swap_roll_pitch,
            ),
            None => OutputRow::unmatched(record),
        })
        .collect()
}

/// Trajectory time to look up for each record.
fn target_times(records: &[CaptureRecord], table: &TrajectoryTable, config: &PipelineConfig) -> Vec<f64> {
    let reconcile =
        config.capture.format == CaptureFormat::Legacy || config.extended.reconcile_times;
    if !reconcile {
        return records.iter().map(|r| r.capture_time).collect();
    }

    let reconciler = EpochReconciler::for_trajectory(table, config.time.leap_seconds);
    log::debug!(
        "Reconciling capture times: day offset {} s, leap seconds {}",
        reconciler.day_of_week_offset(),
        reconciler.leap_seconds()
    );
    records
        .iter()
        .map(|r| reconciler.to_absolute(r.capture_time))
        .collect()
}

fn matched_rows(records: &[CaptureRecord], table: &TrajectoryTable, config: &PipelineConfig) -> Vec<OutputRow> {
    let targets = target_times(records, table, config);
    let results = match_all(table, &targets, &config.matching);
    let source = table.source().unwrap_or_else(|| Path::new("trajectory"));

    records
        .iter()
        .zip(&results)
        .map(|(record, result)| {
            if let MatchResult::NoMatch { target_time } = result {
                log::warn!(
                    "No trajectory sample in {} within {} s of {} (t = {})",
                    source.display(),
                    config.matching.window_s,
                    record.file_name,
                    target_time
                );
            }
            OutputRow::from_match(record, result, table.units(), config.trajectory.heading_convention)
        })
        .collect()
}

/// Build the image metadata CSV for the basin at `base`.
///
/// # Arguments
///
/// * `config` - Pipeline configuration
/// * `base` - Basin directory holding the capture logs and trajectory
///
/// # Errors
///
/// Returns an error if the capture logs or the trajectory are missing or
/// malformed, or if the output cannot be written.
pub fn run(config: &PipelineConfig, base: &Path) -> Result<RunSummary> {
    let options = CaptureOptions::from_config(config);
    let records = parse_capture_logs(&config.paths.capture_dir(base), &options)?;
    log::info!("Parsed {} capture records", records.len());

    let (rows, inline) = if config.requires_trajectory() {
        let path = config.paths.trajectory_path(base);
        let table = load_trajectory_csv(&path, trajectory_units(config))?;
        (matched_rows(&records, &table, config), 0)
    } else {
        let rows = inline_rows(&records, config);
        let inline = rows.iter().filter(|r| r.is_complete()).count();
        (rows, inline)
    };

    let rows = assemble(rows);
    let complete = rows.iter().filter(|r| r.is_complete()).count();

    let output = config.paths.output_path(base);
    write_metadata_csv(&output, &rows)?;

    Ok(RunSummary {
        total: rows.len(),
        inline,
        matched: complete - inline,
        unmatched: rows.len() - complete,
        output,
    })
}

/// Convert a binary SBET file into a trajectory CSV.
///
/// Returns the number of records written.
pub fn extract_sbet(input: &Path, output: &Path, unit: AngleUnit) -> Result<usize> {
    let records = read_sbet_binary(input)?;
    write_trajectory_csv(output, &records, unit)?;
    log::info!("Extracted {} SBET records to {}", records.len(), output.display());
    Ok(records.len())
}

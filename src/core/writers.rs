//! Data writers for the image metadata CSV and extracted trajectory tables.
//!
//! Both files are consumed by other tools, so they are written to a temporary
//! file next to the destination and only moved into place once complete. A
//! failed write never leaves a truncated CSV behind.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use super::loaders::{SbetRecord, TRAJECTORY_COLUMNS};
use super::transforms::AngleUnit;

/// Column names of the metadata CSV, in the order the photogrammetry import expects.
pub const METADATA_HEADER: [&str; 10] = [
    "Filename",
    "X",
    "Y",
    "Z",
    "Yaw",
    "Pitch",
    "Roll",
    "Time Diff",
    "Timestamp",
    "Time of Day",
];

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the temporary output file.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Failed to move the finished file into place.
    #[error("failed to move output into place at '{path}': {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// One row of the image metadata CSV.
///
/// Position, orientation and time difference are `None` for images without
/// a trajectory match and are written as empty fields.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub file_name: String,
    /// Longitude in decimal degrees.
    pub x: Option<f64>,
    /// Latitude in decimal degrees.
    pub y: Option<f64>,
    /// Altitude in metres.
    pub z: Option<f64>,
    /// Degrees clockwise from north in `[0, 360)`.
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    /// Requested time minus matched trajectory time, in seconds.
    pub time_diff: Option<f64>,
    /// Capture time as logged.
    pub timestamp: f64,
    /// `HH:MM:SS` of the timestamp.
    pub time_of_day: String,
}

impl OutputRow {
    /// True when position and orientation are present.
    pub fn is_complete(&self) -> bool {
        [self.x, self.y, self.z, self.yaw, self.pitch, self.roll]
            .iter()
            .all(Option::is_some)
    }

    fn to_record(&self) -> [String; 10] {
        [
            self.file_name.clone(),
            format_optional(self.x),
            format_optional(self.y),
            format_optional(self.z),
            format_optional(self.yaw),
            format_optional(self.pitch),
            format_optional(self.roll),
            format_optional(self.time_diff),
            self.timestamp.to_string(),
            self.time_of_day.clone(),
        ]
    }
}

/// Shortest representation that parses back to the same value; empty for `None`.
fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Write a CSV through a temporary file in the destination directory and
/// rename it to `path` once every row has been flushed.
fn write_csv_atomically<F>(path: &Path, write_rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<BufWriter<&mut File>>) -> csv::Result<()>,
{
    ensure_parent_dirs(path)?;

    let path_str = path.display().to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WriteError::CreateFile {
        path: path_str.clone(),
        source: e,
    })?;

    {
        let mut csv_writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(BufWriter::new(tmp.as_file_mut()));

        write_rows(&mut csv_writer).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

        csv_writer.flush().map_err(|e| WriteError::WriteFile {
            path: path_str.clone(),
            source: e,
        })?;
    }

    tmp.persist(path).map_err(|e| WriteError::Persist {
        path: path_str,
        source: e.error,
    })?;

    Ok(())
}

/// Write the image metadata CSV.
///
/// Rows are written in the given order under [`METADATA_HEADER`], one line
/// per image, `\n` terminated.
///
/// # Errors
///
/// Returns an error if the destination cannot be created or written. In that
/// case no file (partial or otherwise) is left at `path`.
///
/// # Example
///
/// ```no_run
/// use georef_pipeline::core::writers::{write_metadata_csv, OutputRow};
/// use std::path::Path;
///
/// let rows: Vec<OutputRow> = Vec::new();
/// write_metadata_csv(Path::new("images_metadata.csv"), &rows).unwrap();
/// ```
pub fn write_metadata_csv(path: &Path, rows: &[OutputRow]) -> Result<()> {
    write_csv_atomically(path, |writer| {
        writer.write_record(METADATA_HEADER)?;
        for row in rows {
            writer.write_record(row.to_record())?;
        }
        Ok(())
    })?;

    log::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write SBET records as a trajectory CSV readable by the trajectory loader.
///
/// X is longitude and Y latitude. Angular columns are written in `unit`
/// (SBET stores radians).
pub fn write_trajectory_csv(path: &Path, records: &[SbetRecord], unit: AngleUnit) -> Result<()> {
    write_csv_atomically(path, |writer| {
        writer.write_record(TRAJECTORY_COLUMNS)?;
        for rec in records {
            writer.write_record(&[
                rec.time.to_string(),
                unit.from_radians(rec.longitude).to_string(),
                unit.from_radians(rec.latitude).to_string(),
                rec.altitude.to_string(),
                unit.from_radians(rec.roll).to_string(),
                unit.from_radians(rec.pitch).to_string(),
                unit.from_radians(rec.heading).to_string(),
            ])?;
        }
        Ok(())
    })
}

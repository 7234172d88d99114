//! Data loaders for trajectory tables, binary SBET files and metadata CSVs.
//!
//! This module provides parsers for:
//! - Trajectory CSV tables (`GpsTime, X, Y, Z, Roll, Pitch, Heading`)
//! - Applanix SBET binary files (17 little-endian doubles per record)
//! - Image metadata CSVs as written by [`crate::core::writers::write_metadata_csv`]

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::core::transforms::AngleUnit;
use crate::core::writers::{OutputRow, METADATA_HEADER};

/// Seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Required trajectory columns.
pub const GPS_TIME_COLUMN: &str = "GpsTime";
pub const TRAJECTORY_COLUMNS: [&str; 7] = [GPS_TIME_COLUMN, "X", "Y", "Z", "Roll", "Pitch", "Heading"];

/// Number of doubles in one SBET record.
pub const SBET_RECORD_FIELDS: usize = 17;
const SBET_RECORD_BYTES: usize = SBET_RECORD_FIELDS * std::mem::size_of::<f64>();

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error reading '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{}' is missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}:{line}: invalid {column} value '{value}'", .path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    #[error("empty file: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error(
        "{}:{line}: GpsTime {current} does not increase (previous {previous})",
        .path.display()
    )]
    NotTimeOrdered {
        path: PathBuf,
        line: u64,
        previous: f64,
        current: f64,
    },

    #[error("unexpected header in '{}': {found}", .path.display())]
    HeaderMismatch { path: PathBuf, found: String },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Declared units of a trajectory table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrajectoryUnits {
    /// Unit of X (longitude) and Y (latitude).
    pub position: AngleUnit,
    /// Unit of roll, pitch and heading.
    pub attitude: AngleUnit,
}

/// One row of the navigation trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    /// Absolute GPS week seconds.
    pub gps_time: f64,
    pub x: f32,
    pub y: f32,
    /// Altitude in metres.
    pub z: f32,
    pub roll: f32,
    pub pitch: f32,
    pub heading: f32,
}

/// Time-ordered trajectory loaded once per run.
#[derive(Debug, Clone)]
pub struct TrajectoryTable {
    samples: Vec<TrajectorySample>,
    units: TrajectoryUnits,
    day_of_week_offset: f64,
    source: Option<PathBuf>,
}

/// Seconds from the start of the GPS week to midnight of the day containing `gps_time`.
pub fn day_of_week_offset(gps_time: f64) -> f64 {
    (gps_time / SECONDS_PER_DAY).floor() * SECONDS_PER_DAY
}

impl TrajectoryTable {
    /// Build a table from samples, checking that time strictly increases.
    ///
    /// The day-of-week offset is derived from the first sample.
    pub fn new(
        samples: Vec<TrajectorySample>,
        units: TrajectoryUnits,
        source: Option<PathBuf>,
    ) -> Result<Self> {
        let label = || source.clone().unwrap_or_default();

        let first = samples
            .first()
            .ok_or_else(|| LoaderError::EmptyFile(label()))?;
        let day_of_week_offset = day_of_week_offset(first.gps_time);

        for (idx, pair) in samples.windows(2).enumerate() {
            if !(pair[1].gps_time > pair[0].gps_time) {
                return Err(LoaderError::NotTimeOrdered {
                    path: label(),
                    // header line + 1-based index of the second sample
                    line: idx as u64 + 3,
                    previous: pair[0].gps_time,
                    current: pair[1].gps_time,
                });
            }
        }

        Ok(Self {
            samples,
            units,
            day_of_week_offset,
            source,
        })
    }

    #[inline]
    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn units(&self) -> TrajectoryUnits {
        self.units
    }

    /// Offset added to relative capture times, computed from the first sample.
    #[inline]
    pub fn day_of_week_offset(&self) -> f64 {
        self.day_of_week_offset
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Covered time span as `(first, last)` GPS time.
    pub fn time_span(&self) -> (f64, f64) {
        let first = self.samples.first().map_or(f64::NAN, |s| s.gps_time);
        let last = self.samples.last().map_or(f64::NAN, |s| s.gps_time);
        (first, last)
    }
}

fn open_existing(path: &Path) -> Result<File> {
    if !path.is_file() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }
    File::open(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn record_line(record: &StringRecord, fallback: usize) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or(fallback as u64)
}

/// Load a trajectory table from CSV.
///
/// Columns are located by header name (case-insensitive), so column order
/// does not matter. `GpsTime` is kept in double precision, the remaining
/// columns are stored as `f32`.
///
/// # Arguments
///
/// * `path` - Path to the trajectory CSV
/// * `units` - Declared units of the angular columns
///
/// # Errors
///
/// Returns an error if the file is missing, a required column is absent, a
/// value cannot be parsed, the table is empty, or time does not increase.
pub fn load_trajectory_csv<P: AsRef<Path>>(path: P, units: TrajectoryUnits) -> Result<TrajectoryTable> {
    let path = path.as_ref();
    let file = open_existing(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(BufReader::new(file));

    let csv_err = |source: csv::Error| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(csv_err)?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let mut indices = [0usize; 7];
    for (slot, column) in indices.iter_mut().zip(TRAJECTORY_COLUMNS) {
        *slot = col_map
            .get(&column.to_lowercase())
            .copied()
            .ok_or_else(|| LoaderError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
    }

    let field = |record: &StringRecord, n: usize, line: u64| -> Result<f64> {
        let value = record.get(indices[n]).unwrap_or("");
        value.parse::<f64>().map_err(|_| LoaderError::Parse {
            path: path.to_path_buf(),
            line,
            column: TRAJECTORY_COLUMNS[n].to_string(),
            value: value.to_string(),
        })
    };

    let mut samples = Vec::with_capacity(100_000);
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let line = record_line(&record, idx + 2);

        samples.push(TrajectorySample {
            gps_time: field(&record, 0, line)?,
            x: field(&record, 1, line)? as f32,
            y: field(&record, 2, line)? as f32,
            z: field(&record, 3, line)? as f32,
            roll: field(&record, 4, line)? as f32,
            pitch: field(&record, 5, line)? as f32,
            heading: field(&record, 6, line)? as f32,
        });
    }

    let table = TrajectoryTable::new(samples, units, Some(path.to_path_buf()))?;
    let (first, last) = table.time_span();
    log::info!(
        "Loaded {} trajectory samples from {} (GpsTime {:.3} - {:.3})",
        table.len(),
        path.display(),
        first,
        last
    );

    Ok(table)
}

/// One record of an Applanix SBET file. Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SbetRecord {
    pub time: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub x_velocity: f64,
    pub y_velocity: f64,
    pub z_velocity: f64,
    pub roll: f64,
    pub pitch: f64,
    pub heading: f64,
    pub wander: f64,
    pub x_force: f64,
    pub y_force: f64,
    pub z_force: f64,
    pub x_angular_rate: f64,
    pub y_angular_rate: f64,
    pub z_angular_rate: f64,
}

impl SbetRecord {
    fn from_le_bytes(buf: &[u8; SBET_RECORD_BYTES]) -> Self {
        let mut v = [0f64; SBET_RECORD_FIELDS];
        for (value, chunk) in v.iter_mut().zip(buf.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *value = f64::from_le_bytes(bytes);
        }

        Self {
            time: v[0],
            latitude: v[1],
            longitude: v[2],
            altitude: v[3],
            x_velocity: v[4],
            y_velocity: v[5],
            z_velocity: v[6],
            roll: v[7],
            pitch: v[8],
            heading: v[9],
            wander: v[10],
            x_force: v[11],
            y_force: v[12],
            z_force: v[13],
            x_angular_rate: v[14],
            y_angular_rate: v[15],
            z_angular_rate: v[16],
        }
    }
}

/// Read all records of a binary SBET file.
///
/// Trailing bytes that do not form a complete record are ignored.
pub fn read_sbet_binary<P: AsRef<Path>>(path: P) -> Result<Vec<SbetRecord>> {
    let path = path.as_ref();
    let file = open_existing(path)?;
    let io_err = |source: std::io::Error| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = fs::metadata(path).map_err(io_err)?.len() as usize;
    let trailing = size % SBET_RECORD_BYTES;
    if trailing != 0 {
        log::warn!(
            "{}: ignoring {} trailing bytes of an incomplete record",
            path.display(),
            trailing
        );
    }

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut records = Vec::with_capacity(size / SBET_RECORD_BYTES);
    let mut buf = [0u8; SBET_RECORD_BYTES];

    loop {
        match reader.read_exact(&mut buf) {
            Ok(()) => records.push(SbetRecord::from_le_bytes(&buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(io_err(e)),
        }
    }

    if records.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(records)
}

fn parse_optional(
    record: &StringRecord,
    idx: usize,
    path: &Path,
    line: u64,
) -> Result<Option<f64>> {
    let value = record.get(idx).unwrap_or("");
    if value.is_empty() {
        return Ok(None);
    }
    value.parse::<f64>().map(Some).map_err(|_| LoaderError::Parse {
        path: path.to_path_buf(),
        line,
        column: METADATA_HEADER[idx].to_string(),
        value: value.to_string(),
    })
}

/// Read an image metadata CSV back into rows.
///
/// The header must match [`METADATA_HEADER`] exactly; empty position or
/// orientation fields are returned as `None`.
pub fn read_metadata_csv<P: AsRef<Path>>(path: P) -> Result<Vec<OutputRow>> {
    let path = path.as_ref();
    let file = open_existing(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let csv_err = |source: csv::Error| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(csv_err)?.clone();
    if !headers.iter().eq(METADATA_HEADER.iter().copied()) {
        return Err(LoaderError::HeaderMismatch {
            path: path.to_path_buf(),
            found: headers.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(csv_err)?;
        let line = record_line(&record, idx + 2);

        let timestamp = parse_optional(&record, 8, path, line)?.ok_or_else(|| LoaderError::Parse {
            path: path.to_path_buf(),
            line,
            column: METADATA_HEADER[8].to_string(),
            value: String::new(),
        })?;

        rows.push(OutputRow {
            file_name: record.get(0).unwrap_or("").to_string(),
            x: parse_optional(&record, 1, path, line)?,
            y: parse_optional(&record, 2, path, line)?,
            z: parse_optional(&record, 3, path, line)?,
            yaw: parse_optional(&record, 4, path, line)?,
            pitch: parse_optional(&record, 5, path, line)?,
            roll: parse_optional(&record, 6, path, line)?,
            time_diff: parse_optional(&record, 7, path, line)?,
            timestamp,
            time_of_day: record.get(9).unwrap_or("").to_string(),
        });
    }

    Ok(rows)
}

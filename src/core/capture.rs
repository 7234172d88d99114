//! Capture log (EIF) parsing.
//!
//! A flight line produces one or more `*.eif` logs with one line per camera
//! trigger. Two layouts exist and the one in use is selected by configuration:
//!
//! - **Legacy**: whitespace separated `<seconds-of-day> <raw image path>`,
//!   no navigation data.
//! - **Extended**: a few commentary lines followed by semicolon separated rows
//!   `time;file;sequenceID;roll;pitch;yaw;omega;phi;kappa;latitude;longitude;altitude`
//!   with absolute GPS time and navigation in decimal degrees.
//!
//! Raw image paths are written by the acquisition system with Windows
//! separators; only the final component is kept.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PipelineConfig;

/// Number of columns in an extended log row.
const EXTENDED_COLUMNS: usize = 12;

mod col {
    pub const TIME: usize = 0;
    pub const FILE: usize = 1;
    pub const ROLL: usize = 3;
    pub const PITCH: usize = 4;
    pub const YAW: usize = 5;
    pub const LATITUDE: usize = 9;
    pub const LONGITUDE: usize = 10;
    pub const ALTITUDE: usize = 11;
}

/// Errors that can occur while reading capture logs.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no capture logs (*.{extension}) found under '{}'", .path.display())]
    NoCaptureLogs { path: PathBuf, extension: String },

    #[error("capture logs under '{}' contain no records", .path.display())]
    NoRecords { path: PathBuf },

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(
        "{}:{line}: logged image type '{logged}' does not match configured type '{expected}'",
        .path.display()
    )]
    ImageTypeMismatch {
        path: PathBuf,
        line: usize,
        logged: String,
        expected: String,
    },
}

/// Result type for capture log operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Layout of the capture logs of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    /// Relative time and file path only.
    Legacy,
    /// Absolute time, file path and inline navigation.
    #[default]
    Extended,
}

/// Navigation logged next to a trigger event (extended logs only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InlineNavigation {
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// One triggered photo.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    /// Image file name with the configured image type as extension.
    pub file_name: String,
    /// Seconds of day (legacy) or absolute GPS week seconds (extended).
    pub capture_time: f64,
    /// Inline navigation, present only in extended logs.
    pub navigation: Option<InlineNavigation>,
}

/// Parser settings derived from the pipeline configuration.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub format: CaptureFormat,
    pub image_type: String,
    pub strict_image_type: bool,
    pub header_lines: usize,
    pub log_extension: String,
}

impl CaptureOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            format: config.capture.format,
            image_type: config.capture.image_type.trim_start_matches('.').to_string(),
            strict_image_type: config.capture.strict_image_type,
            header_lines: config.extended.header_lines,
            log_extension: config.paths.log_extension.trim_start_matches('.').to_string(),
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Last path component of a logged image path, accepting both separators.
fn final_component(raw_path: &str) -> &str {
    raw_path
        .trim()
        .rsplit(|c| c == '\\' || c == '/')
        .next()
        .unwrap_or("")
}

/// Split a file name into stem and extension (a leading dot is not an extension).
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Extract the image file name from a logged path and set its extension.
///
/// ```
/// use georef_pipeline::core::capture::image_file_name;
///
/// assert_eq!(image_file_name(r"D:\flight\cam\IMG_0001.IIQ", "tif"), "IMG_0001.tif");
/// ```
pub fn image_file_name(raw_path: &str, image_type: &str) -> String {
    let (stem, _) = split_extension(final_component(raw_path));
    format!("{}.{}", stem, image_type.trim_start_matches('.'))
}

impl CaptureFormat {
    /// Parse every record of one capture log, in file order.
    pub fn parse_file(self, path: &Path, options: &CaptureOptions) -> Result<Vec<CaptureRecord>> {
        let file = File::open(path).map_err(|source| CaptureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let skip = match self {
            CaptureFormat::Legacy => 0,
            CaptureFormat::Extended => options.header_lines,
        };

        let mut records = Vec::with_capacity(1024);

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| CaptureError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            if idx < skip {
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed = match self {
                CaptureFormat::Legacy => parse_legacy_line(trimmed),
                CaptureFormat::Extended => {
                    if trimmed.starts_with('#') {
                        continue;
                    }
                    parse_extended_line(trimmed)
                }
            };

            let (raw_path, capture_time, navigation) =
                parsed.map_err(|message| CaptureError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    message,
                })?;

            let file_name = final_component(raw_path);
            if options.strict_image_type {
                check_image_type(file_name, &options.image_type).map_err(|logged| {
                    CaptureError::ImageTypeMismatch {
                        path: path.to_path_buf(),
                        line: line_no,
                        logged,
                        expected: options.image_type.clone(),
                    }
                })?;
            }

            records.push(CaptureRecord {
                file_name: image_file_name(file_name, &options.image_type),
                capture_time,
                navigation,
            });
        }

        Ok(records)
    }
}

type ParsedLine<'a> = std::result::Result<(&'a str, f64, Option<InlineNavigation>), String>;

fn parse_field(fields: &[&str], idx: usize, name: &str) -> std::result::Result<f64, String> {
    let raw = fields[idx];
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {} value '{}'", name, raw))
}

/// The logged path must end in a file name, not a separator.
fn check_file_name(raw_path: &str) -> std::result::Result<(), String> {
    if raw_path.is_empty() {
        return Err("missing file path".to_string());
    }
    if final_component(raw_path).is_empty() {
        return Err(format!("no file name in path '{}'", raw_path));
    }
    Ok(())
}

fn parse_legacy_line(line: &str) -> ParsedLine<'_> {
    let (time, raw_path) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| "expected '<time> <file path>'".to_string())?;

    let raw_path = raw_path.trim();
    check_file_name(raw_path)?;

    let capture_time = time
        .parse::<f64>()
        .map_err(|_| format!("invalid time value '{}'", time))?;

    Ok((raw_path, capture_time, None))
}

fn parse_extended_line(line: &str) -> ParsedLine<'_> {
    let fields: Vec<&str> = line.split(';').map(str::trim).collect();
    if fields.len() < EXTENDED_COLUMNS {
        return Err(format!(
            "expected {} semicolon separated columns, found {}",
            EXTENDED_COLUMNS,
            fields.len()
        ));
    }

    let capture_time = parse_field(&fields, col::TIME, "time")?;
    let raw_path = fields[col::FILE];
    check_file_name(raw_path)?;

    let navigation = InlineNavigation {
        longitude: parse_field(&fields, col::LONGITUDE, "longitude")?,
        latitude: parse_field(&fields, col::LATITUDE, "latitude")?,
        altitude: parse_field(&fields, col::ALTITUDE, "altitude")?,
        yaw: parse_field(&fields, col::YAW, "yaw")?,
        pitch: parse_field(&fields, col::PITCH, "pitch")?,
        roll: parse_field(&fields, col::ROLL, "roll")?,
    };

    Ok((raw_path, capture_time, Some(navigation)))
}

/// Err carries the offending logged extension.
fn check_image_type(file_name: &str, image_type: &str) -> std::result::Result<(), String> {
    match split_extension(file_name) {
        (_, Some(ext)) if !ext.eq_ignore_ascii_case(image_type) => Err(ext.to_string()),
        _ => Ok(()),
    }
}

fn collect_logs(dir: &Path, extension: &str, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_logs(&path, extension, found)?;
        } else if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
        {
            found.push(path);
        }
    }
    Ok(())
}

/// Find capture logs below `dir`, recursively.
///
/// The result is sorted so the encounter order does not depend on the
/// filesystem. An absent directory or zero matching files is an error.
pub fn discover_capture_logs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let no_logs = || CaptureError::NoCaptureLogs {
        path: dir.to_path_buf(),
        extension: extension.to_string(),
    };

    if !dir.is_dir() {
        return Err(no_logs());
    }

    let mut found = Vec::new();
    collect_logs(dir, extension, &mut found).map_err(|source| CaptureError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    if found.is_empty() {
        return Err(no_logs());
    }

    found.sort();
    Ok(found)
}

/// Parse all capture logs below `dir`, concatenated in encounter order.
///
/// # Errors
///
/// Fails when no logs are found, a log cannot be parsed, or the logs hold no
/// records at all.
pub fn parse_capture_logs(dir: &Path, options: &CaptureOptions) -> Result<Vec<CaptureRecord>> {
    let logs = discover_capture_logs(dir, &options.log_extension)?;
    log::info!("Found {} capture logs under {}", logs.len(), dir.display());

    let mut records = Vec::new();
    for log_path in &logs {
        let parsed = options.format.parse_file(log_path, options)?;
        log::debug!("{}: {} records", log_path.display(), parsed.len());
        records.extend(parsed);
    }

    if records.is_empty() {
        return Err(CaptureError::NoRecords {
            path: dir.to_path_buf(),
        });
    }

    Ok(records)
}

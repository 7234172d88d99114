//! Configuration types for the georeferencing pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::capture::CaptureFormat;
use crate::core::transforms::{AngleUnit, YawConvention};
use crate::processors::matching::SearchStrategy;

/// Locations of the inputs and output relative to a basin directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root directory of the basin (usually given on the command line)
    #[serde(default)]
    pub base_path: Option<PathBuf>,

    /// Directory below the base path holding the capture logs
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    /// File extension of the capture logs
    #[serde(default = "default_log_extension")]
    pub log_extension: String,

    /// Directory below the base path holding the trajectory table
    #[serde(default = "default_sbet_dir")]
    pub sbet_dir: String,

    /// File name of the trajectory table
    #[serde(default = "default_sbet_file")]
    pub sbet_file: String,

    /// File name of the metadata CSV, written to the base path
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

fn default_image_dir() -> String {
    "camera".to_string()
}

fn default_log_extension() -> String {
    "eif".to_string()
}

fn default_sbet_dir() -> String {
    "SBET".to_string()
}

fn default_sbet_file() -> String {
    "sbet.csv".to_string()
}

fn default_output_file() -> String {
    "images_metadata.csv".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            image_dir: default_image_dir(),
            log_extension: default_log_extension(),
            sbet_dir: default_sbet_dir(),
            sbet_file: default_sbet_file(),
            output_file: default_output_file(),
        }
    }
}

impl PathsConfig {
    /// Directory scanned for capture logs.
    pub fn capture_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.image_dir)
    }

    /// Full path of the trajectory table.
    pub fn trajectory_path(&self, base: &Path) -> PathBuf {
        base.join(&self.sbet_dir).join(&self.sbet_file)
    }

    /// Full path of the metadata CSV.
    pub fn output_path(&self, base: &Path) -> PathBuf {
        base.join(&self.output_file)
    }
}

/// Configuration for capture log parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureConfig {
    /// Capture log layout used by every log of the run
    #[serde(default)]
    pub format: CaptureFormat,

    /// Image type written into the Filename column (e.g. "tif")
    #[serde(default = "default_image_type")]
    pub image_type: String,

    /// Query the trajectory even when the logs carry inline navigation
    #[serde(default)]
    pub force_query: bool,

    /// Reject logged file names whose extension differs from `image_type`
    #[serde(default)]
    pub strict_image_type: bool,
}

fn default_image_type() -> String {
    "tif".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: CaptureFormat::default(),
            image_type: default_image_type(),
            force_query: false,
            strict_image_type: false,
        }
    }
}

/// Settings that only apply to the extended (semicolon) capture log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtendedConfig {
    /// Leading commentary lines skipped in every log
    #[serde(default = "default_header_lines")]
    pub header_lines: usize,

    /// Sign convention of the logged yaw
    #[serde(default = "default_extended_yaw")]
    pub yaw_convention: YawConvention,

    /// Logs with roll/pitch swapped and pitch offset by 180 degrees
    #[serde(default)]
    pub swap_roll_pitch: bool,

    /// Treat logged times as relative when a trajectory query is forced
    #[serde(default)]
    pub reconcile_times: bool,
}

fn default_header_lines() -> usize {
    3
}

fn default_extended_yaw() -> YawConvention {
    YawConvention::Reversed
}

impl Default for ExtendedConfig {
    fn default() -> Self {
        Self {
            header_lines: default_header_lines(),
            yaw_convention: default_extended_yaw(),
            swap_roll_pitch: false,
            reconcile_times: false,
        }
    }
}

/// Declared units of the trajectory table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrajectoryConfig {
    /// Unit of the X (longitude) and Y (latitude) columns
    #[serde(default)]
    pub position_unit: AngleUnit,

    /// Unit of the Roll, Pitch and Heading columns
    #[serde(default)]
    pub attitude_unit: AngleUnit,

    /// Sign convention of the Heading column
    #[serde(default)]
    pub heading_convention: YawConvention,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            position_unit: AngleUnit::Degrees,
            attitude_unit: AngleUnit::Degrees,
            heading_convention: YawConvention::SignedHeading,
        }
    }
}

/// Clock reconciliation between capture logs and the trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeConfig {
    /// GPS - UTC offset in seconds (18 since 2017, 17 for 2015-2016, 16 for 2012-2015)
    #[serde(default = "default_leap_seconds")]
    pub leap_seconds: f64,
}

fn default_leap_seconds() -> f64 {
    18.0
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            leap_seconds: default_leap_seconds(),
        }
    }
}

/// Configuration for the nearest-time match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Half width of the symmetric search window in seconds
    #[serde(default = "default_window_s")]
    pub window_s: f64,

    /// Search implementation
    #[serde(default)]
    pub strategy: SearchStrategy,
}

fn default_window_s() -> f64 {
    0.05
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            window_s: default_window_s(),
            strategy: SearchStrategy::default(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub extended: ExtendedConfig,

    #[serde(default)]
    pub trajectory: TrajectoryConfig,

    #[serde(default)]
    pub time: TimeConfig,

    #[serde(default)]
    pub matching: MatchingConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether the run needs the trajectory table at all.
    pub fn requires_trajectory(&self) -> bool {
        self.capture.format == CaptureFormat::Legacy || self.capture.force_query
    }
}
